use crate::domain::model::{Address, ClassificationRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to one object's light curve, by named value sequence.
pub trait LightCurve: Send + Sync {
    fn id(&self) -> &str;

    /// `None` when the light curve does not carry `field` at all.
    fn values(&self, field: &str) -> Option<&[f64]>;
}

/// Line-of-sight reddening E(B-V) for a sky position in degrees.
pub trait ReddeningMap: Send + Sync {
    fn ebv(&self, ra: f64, dec: f64) -> Result<f64>;
}

/// An open handle to a remote service, bound to one address.
#[async_trait]
pub trait RpcConnection: Send + Sync + std::fmt::Debug {
    fn address(&self) -> &Address;

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;
}

/// Creates connections for the cache. Must not perform blocking network I/O.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, address: &Address) -> Result<Arc<dyn RpcConnection>>;
}

/// The classification entry point: a list of per-object records in, the service verdict out.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, light_curves: &[ClassificationRequest]) -> Result<serde_json::Value>;
}
