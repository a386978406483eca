//! Typed region configuration.
//!
//! A [`RegionConfig`] is loaded once, validated, and then handed to the
//! topology builder. Nothing downstream looks configuration up by key.

use serde::{Deserialize, Serialize};
use stagecraft_core::repository::{GitProvider, SourceRepository};
use stagecraft_core::secret::SecretRef;

use crate::{ConfigError, ConfigResult};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_AZS: u32 = 2;

/// Everything needed to build one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub stack_name: String,
    pub zone_name: String,
    pub region: String,
    pub max_azs: u32,
    /// `None` when the key is absent or null; MX records are then skipped.
    pub mx_records: Option<Vec<MxRecord>>,
    pub certificate: CertificateSource,
    /// Services in declaration order.
    pub services: Vec<ServiceConfig>,
}

impl RegionConfig {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// MX records to create, empty when none are configured.
    pub fn mx_records(&self) -> &[MxRecord] {
        self.mx_records.as_deref().unwrap_or_default()
    }

    /// Construct id of a service: `{stack}-{service}`.
    pub fn service_id(&self, service: &ServiceConfig) -> String {
        format!("{}-{}", self.stack_name, service.name)
    }

    /// Name of the per-stage bucket a service publishes into, if it has one.
    pub fn bucket_name(&self, service: &ServiceConfig, stage: StageName) -> Option<String> {
        let id = self.service_id(service);
        match service.kind {
            ServiceKind::Service => None,
            ServiceKind::Web => Some(format!("{}-{}-static-assets", id, stage)),
            ServiceKind::Static => Some(format!("{}-{}-bucket", id, stage)),
        }
    }

    /// Structural checks every loader runs before returning.
    pub(crate) fn check(&self) -> ConfigResult<()> {
        if self.stack_name.is_empty() {
            return Err(ConfigError::MissingField("stackName".to_string()));
        }
        if self.zone_name.is_empty() {
            return Err(ConfigError::MissingField("zoneName".to_string()));
        }
        if self.max_azs == 0 {
            return Err(ConfigError::invalid("maxAzs", "must be at least 1"));
        }
        self.certificate.check()?;

        let mut seen = std::collections::HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::Duplicate(format!("service '{}'", service.name)));
            }
            for (stage, config) in service.stages.iter() {
                if config.host_name.is_empty() {
                    return Err(ConfigError::MissingField(format!(
                        "{}.stages.{}.hostName",
                        service.config_key, stage
                    )));
                }
                if service.kind == ServiceKind::Web && config.static_assets_host_name.is_none() {
                    return Err(ConfigError::MissingField(format!(
                        "{}.stages.{}.staticAssetsHostName",
                        service.config_key, stage
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Where the edge certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CertificateSource {
    /// Certificates issued out of band, referenced by ARN.
    Existing { arns: Vec<String> },
    /// A certificate declared in the region and validated against the zone.
    Issued {
        domain_name: String,
        alternative_names: Vec<String>,
    },
}

impl CertificateSource {
    fn check(&self) -> ConfigResult<()> {
        match self {
            CertificateSource::Existing { arns } if arns.is_empty() || arns.iter().any(String::is_empty) => {
                Err(ConfigError::MissingField("certificateArn".to_string()))
            }
            CertificateSource::Issued { domain_name, .. } if domain_name.is_empty() => {
                Err(ConfigError::MissingField("certificateDomainName".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
    pub priority: u16,
    pub host_name: String,
}

/// What a declared service expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Fleet per stage behind the shared load balancer.
    Service,
    /// A `Service` that also publishes static assets through a CDN.
    Web,
    /// Bucket and CDN per stage, no fleet.
    Static,
}

impl ServiceKind {
    pub fn default_build_spec(&self) -> &'static str {
        match self {
            ServiceKind::Service | ServiceKind::Web => "buildspec.yml",
            ServiceKind::Static => "buildspec-static.yml",
        }
    }

    pub fn has_fleet(&self) -> bool {
        !matches!(self, ServiceKind::Static)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Service => write!(f, "service"),
            ServiceKind::Web => write!(f, "web"),
            ServiceKind::Static => write!(f, "static"),
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" | "api" => Ok(ServiceKind::Service),
            "web" => Ok(ServiceKind::Web),
            "static" => Ok(ServiceKind::Static),
            _ => Err(ConfigError::invalid(
                "kind",
                format!("unknown service kind: {}", s),
            )),
        }
    }
}

/// One declared logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Key of the service block in the JSON context (e.g. `webService`).
    pub config_key: String,
    pub kind: ServiceKind,
    pub source: SourceConfig,
    pub stages: StageSet,
    pub build_spec: Option<String>,
}

impl ServiceConfig {
    pub fn build_spec(&self) -> &str {
        self.build_spec
            .as_deref()
            .unwrap_or_else(|| self.kind.default_build_spec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: SecretRef,
}

impl SourceConfig {
    pub fn to_repository(&self) -> SourceRepository {
        SourceRepository {
            provider: GitProvider::Github,
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            token: self.token.clone(),
        }
    }
}

/// The two stages every service deploys to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Staging,
    Production,
}

impl StageName {
    pub const ALL: [StageName; 2] = [StageName::Staging, StageName::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Staging => "staging",
            StageName::Production => "production",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(StageName::Staging),
            "production" => Ok(StageName::Production),
            _ => Err(ConfigError::invalid(
                "stage",
                format!("unknown stage '{}', expected staging or production", s),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSet {
    pub staging: StageConfig,
    pub production: StageConfig,
}

impl StageSet {
    pub fn get(&self, stage: StageName) -> &StageConfig {
        match stage {
            StageName::Staging => &self.staging,
            StageName::Production => &self.production,
        }
    }

    /// Staging first, then production.
    pub fn iter(&self) -> impl Iterator<Item = (StageName, &StageConfig)> {
        StageName::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub host_name: String,
    /// Listener rule priority of `host_name`.
    pub priority: u32,
    pub static_assets_host_name: Option<String>,
    pub cname: Option<CnameConfig>,
}

impl StageConfig {
    /// Host matched by the cname rule: `{record}.{host}`.
    pub fn cname_host(&self) -> Option<String> {
        self.cname
            .as_ref()
            .map(|c| format!("{}.{}", c.record_name, self.host_name))
    }

    /// Every host name this stage answers on.
    pub fn host_names(&self) -> Vec<String> {
        std::iter::once(self.host_name.clone())
            .chain(self.cname_host())
            .chain(self.static_assets_host_name.clone())
            .collect()
    }
}

/// Secondary record pointing at a stage host, e.g. `www`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnameConfig {
    pub record_name: String,
    pub priority: u32,
}
