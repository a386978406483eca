//! Topology errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("configuration error: {0}")]
    Config(#[from] stagecraft_config::ConfigError),

    #[error("manifest error: {0}")]
    Manifest(#[from] stagecraft_core::Error),
}

pub type TopologyResult<T> = std::result::Result<T, TopologyError>;
