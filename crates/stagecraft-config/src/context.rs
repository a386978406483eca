//! JSON context loading.
//!
//! Accepts either a bare context object or a `cdk.json`-style document
//! with the context under a `context` key. Per-service blocks live at the
//! top level of the context, keyed by their config key.

use serde::Deserialize;
use serde_json::{Map, Value};
use stagecraft_core::secret::SecretRef;
use tracing::debug;

use crate::region::{
    CertificateSource, CnameConfig, DEFAULT_MAX_AZS, DEFAULT_REGION, MxRecord, RegionConfig,
    ServiceConfig, ServiceKind, SourceConfig, StageConfig, StageName, StageSet,
};
use crate::{ConfigError, ConfigResult};

/// Config keys looked up when the context declares no `services` list.
const DEFAULT_SERVICES: [(&str, &str, ServiceKind); 3] = [
    ("webService", "web-service", ServiceKind::Web),
    ("apiService", "api-service", ServiceKind::Service),
    ("staticAssets", "static-assets", ServiceKind::Static),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextDocument {
    stack_name: Option<String>,
    zone_name: Option<String>,
    region: Option<String>,
    max_azs: Option<u32>,
    mx_records: Option<Vec<MxEntry>>,
    certificate_arn: Option<String>,
    certificate_arns: Option<Vec<String>>,
    certificate_domain_name: Option<String>,
    certificate_alternative_domain_name: Option<String>,
    services: Option<Vec<ServiceDeclaration>>,
    #[serde(flatten)]
    blocks: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MxEntry {
    priority: u16,
    host_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDeclaration {
    name: String,
    config_key: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceBlock {
    github_owner: Option<String>,
    github_repo: Option<String>,
    github_branch: Option<String>,
    github_token_secret_arn: Option<String>,
    github_token_field_name: Option<String>,
    build_spec: Option<String>,
    stages: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageBlock {
    host_name: Option<String>,
    priority: Option<u32>,
    static_assets_host_name: Option<String>,
    cname: Option<CnameBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnameBlock {
    record_name: String,
    priority: u32,
}

/// Parse a region configuration from JSON context text.
pub fn parse_context(json: &str) -> ConfigResult<RegionConfig> {
    let value: Value = serde_json::from_str(json)?;
    from_value(value)
}

/// Build a region configuration from an already parsed context value.
pub fn from_value(value: Value) -> ConfigResult<RegionConfig> {
    let context = match value {
        Value::Object(mut doc) => match doc.remove("context") {
            Some(Value::Object(context)) => context,
            Some(_) => {
                return Err(ConfigError::invalid("context", "expected an object"));
            }
            None => doc,
        },
        _ => {
            return Err(ConfigError::invalid(
                "context",
                "expected a JSON object at the document root",
            ));
        }
    };

    let doc: ContextDocument = serde_json::from_value(Value::Object(context))?;

    let certificate = certificate_source(&doc)?;
    let declarations = match doc.services {
        Some(ref declared) => declared
            .iter()
            .map(|d| Ok((d.config_key.clone(), d.name.clone(), d.kind.parse::<ServiceKind>()?)))
            .collect::<ConfigResult<Vec<_>>>()?,
        None => DEFAULT_SERVICES
            .iter()
            .filter(|(key, _, _)| doc.blocks.contains_key(*key))
            .map(|(key, name, kind)| (key.to_string(), name.to_string(), *kind))
            .collect(),
    };

    let mut services = Vec::with_capacity(declarations.len());
    for (config_key, name, kind) in declarations {
        let block = doc
            .blocks
            .get(&config_key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingField(config_key.clone()))?;
        debug!(service = %name, config_key = %config_key, kind = %kind, "loading service block");
        services.push(service_config(name, config_key, kind, block)?);
    }

    let config = RegionConfig {
        stack_name: required(doc.stack_name, "stackName")?,
        zone_name: required(doc.zone_name, "zoneName")?,
        region: doc.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
        max_azs: doc.max_azs.unwrap_or(DEFAULT_MAX_AZS),
        mx_records: doc.mx_records.map(|records| {
            records
                .into_iter()
                .map(|mx| MxRecord {
                    priority: mx.priority,
                    host_name: mx.host_name,
                })
                .collect()
        }),
        certificate,
        services,
    };
    config.check()?;
    Ok(config)
}

fn certificate_source(doc: &ContextDocument) -> ConfigResult<CertificateSource> {
    let mut arns = doc.certificate_arns.clone().unwrap_or_default();
    if let Some(arn) = &doc.certificate_arn {
        arns.insert(0, arn.clone());
    }

    match (&doc.certificate_domain_name, arns.is_empty()) {
        (Some(_), false) => Err(ConfigError::invalid(
            "certificate",
            "certificateDomainName and certificateArn are mutually exclusive",
        )),
        (Some(domain), true) => Ok(CertificateSource::Issued {
            domain_name: domain.clone(),
            alternative_names: doc
                .certificate_alternative_domain_name
                .iter()
                .cloned()
                .collect(),
        }),
        (None, false) => Ok(CertificateSource::Existing { arns }),
        (None, true) => Err(ConfigError::MissingField(
            "certificateArn or certificateDomainName".to_string(),
        )),
    }
}

fn service_config(
    name: String,
    config_key: String,
    kind: ServiceKind,
    block: Value,
) -> ConfigResult<ServiceConfig> {
    let block: ServiceBlock = serde_json::from_value(block)?;
    let field = |f: &str| format!("{}.{}", config_key, f);

    let source = SourceConfig {
        owner: required(block.github_owner, &field("githubOwner"))?,
        repo: required(block.github_repo, &field("githubRepo"))?,
        branch: required(block.github_branch, &field("githubBranch"))?,
        token: SecretRef::new(
            required(block.github_token_secret_arn, &field("githubTokenSecretArn"))?,
            required(block.github_token_field_name, &field("githubTokenFieldName"))?,
        ),
    };

    let mut stages = block
        .stages
        .ok_or_else(|| ConfigError::MissingField(field("stages")))?;
    for key in stages.keys() {
        key.parse::<StageName>()?;
    }
    let mut take_stage = |stage: StageName| -> ConfigResult<StageConfig> {
        let path = format!("{}.stages.{}", config_key, stage);
        let value = stages
            .remove(stage.as_str())
            .ok_or_else(|| ConfigError::MissingField(path.clone()))?;
        let stage: StageBlock = serde_json::from_value(value)?;
        Ok(StageConfig {
            host_name: required(stage.host_name, &format!("{}.hostName", path))?,
            priority: stage
                .priority
                .ok_or_else(|| ConfigError::MissingField(format!("{}.priority", path)))?,
            static_assets_host_name: stage.static_assets_host_name,
            cname: stage.cname.map(|c| CnameConfig {
                record_name: c.record_name,
                priority: c.priority,
            }),
        })
    };
    let stages = StageSet {
        staging: take_stage(StageName::Staging)?,
        production: take_stage(StageName::Production)?,
    };

    Ok(ServiceConfig {
        name,
        config_key,
        kind,
        source,
        stages,
        build_spec: block.build_spec,
    })
}

fn required(value: Option<String>, field: &str) -> ConfigResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_block(name: &str, staging: u32, production: u32) -> Value {
        json!({
            "githubOwner": "acme",
            "githubRepo": name,
            "githubBranch": "main",
            "githubTokenSecretArn": "arn:aws:secretsmanager:us-east-1:1:secret:gh",
            "githubTokenFieldName": "token",
            "stages": {
                "staging": { "hostName": format!("{}-staging.example.com", name), "priority": staging },
                "production": { "hostName": format!("{}.example.com", name), "priority": production }
            }
        })
    }

    fn context() -> Value {
        json!({
            "stackName": "acme",
            "zoneName": "example.com",
            "certificateArn": "arn:aws:acm:us-east-1:1:certificate/abc",
            "services": [
                { "name": "web", "configKey": "webService", "kind": "service" },
                { "name": "api", "configKey": "apiService", "kind": "service" }
            ],
            "webService": service_block("web", 10, 20),
            "apiService": service_block("api", 30, 40)
        })
    }

    #[test]
    fn test_parse_declared_services() {
        let config = from_value(context()).unwrap();
        assert_eq!(config.stack_name, "acme");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.max_azs, DEFAULT_MAX_AZS);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].name, "web");
        assert_eq!(config.services[1].stages.production.priority, 40);
        assert_eq!(
            config.certificate,
            CertificateSource::Existing {
                arns: vec!["arn:aws:acm:us-east-1:1:certificate/abc".to_string()]
            }
        );
    }

    #[test]
    fn test_cdk_json_wrapper() {
        let wrapped = json!({ "app": "npx ts-node bin/cdk.ts", "context": context() });
        let config = parse_context(&wrapped.to_string()).unwrap();
        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_default_service_discovery() {
        let mut ctx = context();
        let obj = ctx.as_object_mut().unwrap();
        obj.remove("services");
        obj.remove("webService");
        let config = from_value(ctx).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].name, "api-service");
        assert_eq!(config.services[0].kind, ServiceKind::Service);
    }

    #[test]
    fn test_null_mx_records() {
        let mut ctx = context();
        ctx["mxRecords"] = Value::Null;
        let config = from_value(ctx).unwrap();
        assert!(config.mx_records.is_none());
    }

    #[test]
    fn test_mx_records() {
        let mut ctx = context();
        ctx["mxRecords"] = json!([{ "priority": 10, "hostName": "mx1.example.com" }]);
        let config = from_value(ctx).unwrap();
        assert_eq!(config.mx_records().len(), 1);
        assert_eq!(config.mx_records()[0].host_name, "mx1.example.com");
    }

    #[test]
    fn test_cname_block() {
        let mut ctx = context();
        ctx["webService"]["stages"]["production"]["cname"] =
            json!({ "recordName": "www", "priority": 50 });
        let config = from_value(ctx).unwrap();
        let prod = &config.services[0].stages.production;
        assert_eq!(prod.cname_host().as_deref(), Some("www.web.example.com"));
    }

    #[test]
    fn test_issued_certificate() {
        let mut ctx = context();
        let obj = ctx.as_object_mut().unwrap();
        obj.remove("certificateArn");
        obj.insert("certificateDomainName".into(), json!("example.com"));
        obj.insert("certificateAlternativeDomainName".into(), json!("*.example.com"));
        let config = from_value(ctx).unwrap();
        assert!(matches!(config.certificate, CertificateSource::Issued { .. }));
    }

    #[test]
    fn test_missing_certificate() {
        let mut ctx = context();
        ctx.as_object_mut().unwrap().remove("certificateArn");
        assert!(matches!(from_value(ctx), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_missing_service_field() {
        let mut ctx = context();
        ctx["apiService"].as_object_mut().unwrap().remove("githubRepo");
        let err = from_value(ctx).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "apiService.githubRepo"));
    }

    #[test]
    fn test_missing_stage() {
        let mut ctx = context();
        ctx["webService"]["stages"]
            .as_object_mut()
            .unwrap()
            .remove("staging");
        let err = from_value(ctx).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "webService.stages.staging"));
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let mut ctx = context();
        ctx["webService"]["stages"]["qa"] = json!({ "hostName": "qa.example.com", "priority": 5 });
        assert!(matches!(
            from_value(ctx),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_declared_block_missing() {
        let mut ctx = context();
        ctx.as_object_mut().unwrap().remove("apiService");
        let err = from_value(ctx).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "apiService"));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(parse_context("[1, 2]").is_err());
        assert!(matches!(parse_context("{"), Err(ConfigError::Json(_))));
    }
}
