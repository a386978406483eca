//! Variable interpolation for region configurations.
//!
//! Supports variables like:
//! - `${stack.name}` - Stack name
//! - `${zone.name}` - Hosted zone name
//! - `${region}` - Deployment region
//! - `${service.name}` - Name of the service the value belongs to
//! - `${env.VAR_NAME}` - Environment variable

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::region::{CertificateSource, RegionConfig, ServiceConfig, StageConfig};

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub stack: StackContext,
    pub service: ServiceContext,
    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Stack context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct StackContext {
    pub name: String,
    pub zone: String,
    pub region: String,
}

/// Service context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct ServiceContext {
    pub name: String,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}")
        .expect("variable pattern is valid")
});

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for the stack-level values of `config`.
    pub fn for_region(config: &RegionConfig) -> Self {
        VariableContextBuilder::new()
            .with_stack(&config.stack_name, &config.zone_name, &config.region)
            .build()
    }

    /// A copy of this context scoped to one service.
    pub fn for_service(&self, name: &str) -> Self {
        let mut ctx = self.clone();
        ctx.service.name = name.to_string();
        ctx
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["stack", "name"] => Some(self.stack.name.clone()),
            ["zone", "name"] => Some(self.stack.zone.clone()),
            ["region"] => Some(self.stack.region.clone()),
            ["service", "name"] if !self.service.name.is_empty() => {
                Some(self.service.name.clone())
            }
            ["env", name] => self.env.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    /// Unknown variables are left in place.
    pub fn interpolate(&self, input: &str) -> String {
        for name in self.unresolved(input) {
            warn!(variable = %name, "Unresolved variable left in place");
        }
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Interpolate variables in a list of strings.
    pub fn interpolate_vec(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.interpolate(s)).collect()
    }

    /// Names of variables used in a string that this context cannot resolve.
    pub fn unresolved(&self, input: &str) -> Vec<String> {
        VAR_REGEX
            .captures_iter(input)
            .filter(|caps| self.resolve(&caps[1]).is_none())
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Interpolate every free-form string of a region configuration.
    ///
    /// Stack name, zone name and region are the inputs of the context and
    /// are not themselves interpolated.
    pub fn apply(&self, config: &mut RegionConfig) {
        if let Some(records) = config.mx_records.as_mut() {
            for mx in records {
                mx.host_name = self.interpolate(&mx.host_name);
            }
        }

        match &mut config.certificate {
            CertificateSource::Existing { arns } => *arns = self.interpolate_vec(arns),
            CertificateSource::Issued {
                domain_name,
                alternative_names,
            } => {
                *domain_name = self.interpolate(domain_name);
                *alternative_names = self.interpolate_vec(alternative_names);
            }
        }

        for service in &mut config.services {
            self.for_service(&service.name).apply_service(service);
        }
    }

    fn apply_service(&self, service: &mut ServiceConfig) {
        let source = &mut service.source;
        source.owner = self.interpolate(&source.owner);
        source.repo = self.interpolate(&source.repo);
        source.branch = self.interpolate(&source.branch);
        source.token.arn = self.interpolate(&source.token.arn);
        source.token.json_field = self.interpolate(&source.token.json_field);

        if let Some(spec) = service.build_spec.as_mut() {
            *spec = self.interpolate(spec);
        }

        self.apply_stage(&mut service.stages.staging);
        self.apply_stage(&mut service.stages.production);
    }

    fn apply_stage(&self, stage: &mut StageConfig) {
        stage.host_name = self.interpolate(&stage.host_name);
        if let Some(host) = stage.static_assets_host_name.as_mut() {
            *host = self.interpolate(host);
        }
        if let Some(cname) = stage.cname.as_mut() {
            cname.record_name = self.interpolate(&cname.record_name);
        }
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_stack(
        mut self,
        name: impl Into<String>,
        zone: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        self.ctx.stack = StackContext {
            name: name.into(),
            zone: zone.into(),
            region: region.into(),
        };
        self
    }

    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.ctx.service.name = name.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
