//! Region configuration for stagecraft.
//!
//! This crate handles:
//! - The typed region configuration model
//! - Loading from a JSON context document or a KDL document
//! - Variable interpolation
//! - Region-wide collision validation

pub mod context;
pub mod error;
pub mod kdl_config;
pub mod region;
pub mod validate;
pub mod variables;

use std::path::Path;

use tracing::info;

pub use error::{ConfigError, ConfigResult};
pub use region::{
    CertificateSource, CnameConfig, MxRecord, RegionConfig, ServiceConfig, ServiceKind,
    SourceConfig, StageConfig, StageName, StageSet,
};
pub use validate::validate_topology;
pub use variables::{VariableContext, VariableContextBuilder};

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON context document (`cdk.json` or a bare context object).
    Json,
    /// KDL region document.
    Kdl,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("kdl") => Ok(ConfigFormat::Kdl),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Parse a region configuration and interpolate it against `env`.
pub fn parse_str(
    content: &str,
    format: ConfigFormat,
    env: impl IntoIterator<Item = (String, String)>,
) -> ConfigResult<RegionConfig> {
    let mut config = match format {
        ConfigFormat::Json => context::parse_context(content)?,
        ConfigFormat::Kdl => kdl_config::parse_region(content)?,
    };

    let mut ctx = VariableContext::for_region(&config);
    ctx.env.extend(env);
    ctx.apply(&mut config);
    config.check()?;
    Ok(config)
}

/// Load a region configuration file, interpolating process environment
/// variables.
pub fn load(path: &Path) -> ConfigResult<RegionConfig> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let config = parse_str(&content, format, std::env::vars())?;
    info!(
        path = %path.display(),
        stack = %config.stack_name,
        services = config.services.len(),
        "loaded region configuration"
    );
    Ok(config)
}
