//! KDL region configuration parsing.
//!
//! ```kdl
//! region "acme" zone="example.com" region="us-east-1"
//! certificate domain="example.com" alternative="*.example.com"
//! mx priority=10 host="mx1.example.com"
//! service "web" kind="web" {
//!     source owner="acme" repo="web" branch="main" token-secret="arn:..." token-field="token"
//!     stage "staging" host="staging.example.com" priority=10
//!     stage "production" host="example.com" priority=20 {
//!         cname "www" priority=50
//!     }
//! }
//! ```

use crate::region::{
    CertificateSource, CnameConfig, DEFAULT_MAX_AZS, DEFAULT_REGION, MxRecord, RegionConfig,
    ServiceConfig, ServiceKind, SourceConfig, StageConfig, StageName, StageSet,
};
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use stagecraft_core::secret::SecretRef;
use std::collections::HashMap;
use tracing::debug;

/// Parse a region configuration from KDL text.
pub fn parse_region(kdl: &str) -> ConfigResult<RegionConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut stack_name = String::new();
    let mut zone_name = String::new();
    let mut region = DEFAULT_REGION.to_string();
    let mut max_azs = DEFAULT_MAX_AZS;
    let mut certificate = None;
    let mut mx_records: Option<Vec<MxRecord>> = None;
    let mut services = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "region" => {
                stack_name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("region name".to_string()))?;
                zone_name = get_string_prop(node, "zone")
                    .ok_or_else(|| ConfigError::MissingField("region zone".to_string()))?;
                if let Some(r) = get_string_prop(node, "region") {
                    region = r;
                }
                if let Some(n) = get_u32_prop(node, "max-azs")? {
                    max_azs = n;
                }
            }
            "certificate" => {
                if certificate.is_some() {
                    return Err(ConfigError::Duplicate("certificate".to_string()));
                }
                certificate = Some(parse_certificate(node)?);
            }
            "mx" => {
                mx_records.get_or_insert_with(Vec::new).push(parse_mx(node)?);
            }
            "service" => {
                services.push(parse_service(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if stack_name.is_empty() {
        return Err(ConfigError::MissingField("region name".to_string()));
    }

    let config = RegionConfig {
        stack_name,
        zone_name,
        region,
        max_azs,
        mx_records,
        certificate: certificate
            .ok_or_else(|| ConfigError::MissingField("certificate".to_string()))?,
        services,
    };
    config.check()?;
    Ok(config)
}

fn parse_certificate(node: &KdlNode) -> ConfigResult<CertificateSource> {
    let arns = get_string_list_prop(node, "arn");
    match get_string_prop(node, "domain") {
        Some(_) if !arns.is_empty() => Err(ConfigError::invalid(
            "certificate",
            "domain and arn are mutually exclusive",
        )),
        Some(domain_name) => Ok(CertificateSource::Issued {
            domain_name,
            alternative_names: get_string_list_prop(node, "alternative"),
        }),
        None if arns.is_empty() => Err(ConfigError::MissingField(
            "certificate arn or domain".to_string(),
        )),
        None => Ok(CertificateSource::Existing { arns }),
    }
}

fn parse_mx(node: &KdlNode) -> ConfigResult<MxRecord> {
    let priority = get_u32_prop(node, "priority")?
        .ok_or_else(|| ConfigError::MissingField("mx priority".to_string()))?;
    let priority = u16::try_from(priority)
        .map_err(|_| ConfigError::invalid("mx priority", "must fit in 16 bits"))?;
    let host_name = get_string_prop(node, "host")
        .ok_or_else(|| ConfigError::MissingField("mx host".to_string()))?;
    Ok(MxRecord {
        priority,
        host_name,
    })
}

fn parse_service(node: &KdlNode) -> ConfigResult<ServiceConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("service name".to_string()))?;
    let kind: ServiceKind = get_string_prop(node, "kind")
        .ok_or_else(|| ConfigError::MissingField(format!("kind for service '{}'", name)))?
        .parse()?;
    let config_key = get_string_prop(node, "config-key").unwrap_or_else(|| name.clone());
    let build_spec = get_string_prop(node, "build-spec");

    let mut source = None;
    let mut stages: HashMap<StageName, StageConfig> = HashMap::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "source" => {
                    source = Some(parse_source(child, &name)?);
                }
                "stage" => {
                    let stage_name: StageName = get_first_string_arg(child)
                        .ok_or_else(|| {
                            ConfigError::MissingField(format!("stage name in service '{}'", name))
                        })?
                        .parse()?;
                    if stages.contains_key(&stage_name) {
                        return Err(ConfigError::Duplicate(format!(
                            "stage '{}' in service '{}'",
                            stage_name, name
                        )));
                    }
                    stages.insert(stage_name, parse_stage(child, &name, stage_name)?);
                }
                _ => {}
            }
        }
    }

    let source = source
        .ok_or_else(|| ConfigError::MissingField(format!("source for service '{}'", name)))?;
    let mut take = |stage: StageName| {
        stages.remove(&stage).ok_or_else(|| {
            ConfigError::MissingField(format!("stage '{}' for service '{}'", stage, name))
        })
    };
    let stages = StageSet {
        staging: take(StageName::Staging)?,
        production: take(StageName::Production)?,
    };

    debug!(service = %name, kind = %kind, "parsed service");

    Ok(ServiceConfig {
        name,
        config_key,
        kind,
        source,
        stages,
        build_spec,
    })
}

fn parse_source(node: &KdlNode, service: &str) -> ConfigResult<SourceConfig> {
    let prop = |key: &str| {
        get_string_prop(node, key).ok_or_else(|| {
            ConfigError::MissingField(format!("source {} for service '{}'", key, service))
        })
    };
    Ok(SourceConfig {
        owner: prop("owner")?,
        repo: prop("repo")?,
        branch: prop("branch")?,
        token: SecretRef::new(prop("token-secret")?, prop("token-field")?),
    })
}

fn parse_stage(node: &KdlNode, service: &str, stage: StageName) -> ConfigResult<StageConfig> {
    let host_name = get_string_prop(node, "host").ok_or_else(|| {
        ConfigError::MissingField(format!("host for stage '{}' of '{}'", stage, service))
    })?;
    let priority = get_u32_prop(node, "priority")?.ok_or_else(|| {
        ConfigError::MissingField(format!("priority for stage '{}' of '{}'", stage, service))
    })?;

    let mut cname = None;
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "cname" {
                let record_name = get_first_string_arg(child).ok_or_else(|| {
                    ConfigError::MissingField(format!("cname record for stage '{}'", stage))
                })?;
                let priority = get_u32_prop(child, "priority")?.ok_or_else(|| {
                    ConfigError::MissingField(format!("cname priority for stage '{}'", stage))
                })?;
                cname = Some(CnameConfig {
                    record_name,
                    priority,
                });
            }
        }
    }

    Ok(StageConfig {
        host_name,
        priority,
        static_assets_host_name: get_string_prop(node, "static-assets-host"),
        cname,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_u32_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<u32>> {
    match node.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(name, "expected a non-negative integer")),
    }
}

fn get_string_list_prop(node: &KdlNode, name: &str) -> Vec<String> {
    let mut result = Vec::new();

    // Repeated attributes like arn="a" arn="b"
    for entry in node.entries() {
        if let Some(entry_name) = entry.name() {
            if entry_name.value() == name {
                if let Some(s) = entry.value().as_string() {
                    result.push(s.to_string());
                }
            }
        }
    }

    if !result.is_empty() {
        return result;
    }

    // Block syntax
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == name {
                return get_all_string_args(child);
            }
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: &str = r#"
        region "acme" zone="example.com" region="eu-west-1"
        certificate domain="example.com" alternative="*.example.com"
        mx priority=10 host="mx1.example.com"
        mx priority=20 host="mx2.example.com"

        service "web" kind="web" {
            source owner="acme" repo="web" branch="main" token-secret="arn:gh" token-field="token"
            stage "staging" host="staging.example.com" priority=10 static-assets-host="static-staging.example.com"
            stage "production" host="example.com" priority=20 static-assets-host="static.example.com" {
                cname "www" priority=50
            }
        }

        service "api" kind="service" {
            source owner="acme" repo="api" branch="main" token-secret="arn:gh" token-field="token"
            stage "staging" host="api-staging.example.com" priority=30
            stage "production" host="api.example.com" priority=40
        }
    "#;

    #[test]
    fn test_parse_region() {
        let config = parse_region(REGION).unwrap();
        assert_eq!(config.stack_name, "acme");
        assert_eq!(config.zone_name, "example.com");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.max_azs, DEFAULT_MAX_AZS);
        assert_eq!(config.mx_records().len(), 2);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].kind, ServiceKind::Web);
        assert_eq!(config.services[1].stages.staging.priority, 30);
        assert_eq!(
            config.services[0].stages.production.cname_host().as_deref(),
            Some("www.example.com")
        );
        assert_eq!(
            config.certificate,
            CertificateSource::Issued {
                domain_name: "example.com".to_string(),
                alternative_names: vec!["*.example.com".to_string()],
            }
        );
    }

    #[test]
    fn test_existing_certificates() {
        let kdl = r#"
            region "acme" zone="example.com"
            certificate arn="arn:a" arn="arn:b"
        "#;
        let config = parse_region(kdl).unwrap();
        assert_eq!(
            config.certificate,
            CertificateSource::Existing {
                arns: vec!["arn:a".to_string(), "arn:b".to_string()]
            }
        );
        assert!(config.mx_records.is_none());
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_missing_stage() {
        let kdl = r#"
            region "acme" zone="example.com"
            certificate arn="arn:a"
            service "api" kind="service" {
                source owner="acme" repo="api" branch="main" token-secret="s" token-field="f"
                stage "staging" host="api-staging.example.com" priority=30
            }
        "#;
        let result = parse_region(kdl);
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_duplicate_stage() {
        let kdl = r#"
            region "acme" zone="example.com"
            certificate arn="arn:a"
            service "api" kind="service" {
                source owner="acme" repo="api" branch="main" token-secret="s" token-field="f"
                stage "staging" host="a.example.com" priority=1
                stage "staging" host="b.example.com" priority=2
            }
        "#;
        assert!(matches!(
            parse_region(kdl),
            Err(ConfigError::Duplicate(_))
        ));
    }

    #[test]
    fn test_unknown_kind() {
        let kdl = r#"
            region "acme" zone="example.com"
            certificate arn="arn:a"
            service "fn" kind="lambda"
        "#;
        assert!(matches!(
            parse_region(kdl),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_negative_priority_rejected() {
        let kdl = r#"
            region "acme" zone="example.com"
            certificate arn="arn:a"
            mx priority=-1 host="mx.example.com"
        "#;
        assert!(matches!(
            parse_region(kdl),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_region_node() {
        let result = parse_region(r#"certificate arn="arn:a""#);
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse_region("region \"acme"),
            Err(ConfigError::Parse(_))
        ));
    }
}
