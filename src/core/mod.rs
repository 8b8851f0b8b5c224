pub mod backoff;
pub mod classifier;
pub mod connection_cache;
pub mod photometry;
pub mod request;

pub use crate::domain::model::{
    Address, ClassificationRequest, ClassificationResult, Observation, RunConfig, RunState,
};
pub use crate::domain::ports::{
    Classify, ConnectionFactory, LightCurve, ReddeningMap, RpcConnection,
};
pub use crate::utils::error::Result;
