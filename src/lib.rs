pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    dust_map::SfdGrid,
    light_curve::InMemoryLightCurve,
    rpc::{TcpConnectionFactory, TcpJsonConnection},
};
pub use config::ClassifierConfig;
pub use core::{
    backoff::{BackoffPolicy, Resilient},
    classifier::{RpcClassifier, T2Classifier},
    connection_cache::ConnectionCache,
};
pub use utils::error::{ClassifyError, Result};
