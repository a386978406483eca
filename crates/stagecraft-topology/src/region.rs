//! Region-wide composition.
//!
//! A region holds exactly one network, one load balancer and one hosted
//! zone. Every declared service is composed on top of them, in declaration
//! order, into a single manifest.

use std::sync::Arc;

use serde::Serialize;
use stagecraft_config::{RegionConfig, ServiceKind, validate_topology};
use stagecraft_core::manifest::{Output, OutputExport};
use stagecraft_core::{Expr, LogicalId, Manifest, Result, Scope};
use tracing::{debug, info};

use crate::dns::SharedZone;
use crate::edge::SharedEdge;
use crate::error::TopologyResult;
use crate::network::Network;
use crate::service::StagedService;
use crate::static_site::StaticSite;

/// Options for [`synthesize`].
#[derive(Debug, Clone, Copy)]
pub struct SynthOptions {
    /// Run region-wide collision validation before composing.
    pub validate: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// A composed service.
#[derive(Debug)]
pub enum ServiceTopology {
    Staged(StagedService),
    Static(StaticSite),
}

impl ServiceTopology {
    pub fn name(&self) -> &str {
        match self {
            ServiceTopology::Staged(s) => &s.name,
            ServiceTopology::Static(s) => &s.name,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceTopology::Staged(s) => s.kind,
            ServiceTopology::Static(_) => ServiceKind::Static,
        }
    }

    pub fn pipeline(&self) -> &LogicalId {
        match self {
            ServiceTopology::Staged(s) => &s.pipeline,
            ServiceTopology::Static(s) => &s.pipeline,
        }
    }

    pub fn summary(&self) -> ServiceSummary {
        let hosts = match self {
            ServiceTopology::Staged(s) => s
                .routing
                .iter()
                .flat_map(|r| {
                    std::iter::once(r.host.clone()).chain(r.cname.as_ref().map(|c| c.host.clone()))
                })
                .chain(s.static_assets.iter().map(|(_, b)| b.host.clone()))
                .collect(),
            ServiceTopology::Static(s) => s.stages.iter().map(|(_, b)| b.host.clone()).collect(),
        };
        ServiceSummary {
            name: self.name().to_string(),
            kind: self.kind(),
            pipeline: self.pipeline().clone(),
            hosts,
        }
    }
}

/// What a service contributes, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub kind: ServiceKind,
    pub pipeline: LogicalId,
    pub hosts: Vec<String>,
}

/// The composed region.
#[derive(Debug)]
pub struct RegionTopology {
    pub manifest: Manifest,
    pub network: Network,
    pub edge: Arc<SharedEdge>,
    pub zone: Arc<SharedZone>,
    pub services: Vec<ServiceTopology>,
}

impl RegionTopology {
    pub fn summaries(&self) -> Vec<ServiceSummary> {
        self.services.iter().map(ServiceTopology::summary).collect()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceTopology> {
        self.services.iter().find(|s| s.name() == name)
    }
}

/// Composes a [`RegionConfig`] into a manifest.
pub struct RegionStack;

impl RegionStack {
    /// Compose without validating. Conflicting priorities or host names end
    /// up in the manifest and surface when it is applied.
    pub fn build(config: &RegionConfig) -> Result<RegionTopology> {
        let scope = Scope::root(config.stack_name.as_str());
        let mut manifest = Manifest::new(format!(
            "{} deployment topology ({})",
            config.stack_name, config.region
        ));

        let network = Network::build(&scope, &mut manifest, config.max_azs)?;
        let zone = SharedZone::build(
            &scope,
            &mut manifest,
            &config.zone_name,
            &config.certificate,
            config.mx_records(),
        )?;
        let edge = SharedEdge::build(&scope, &mut manifest, &network, &zone.certificate_arns)?;

        let mut services = Vec::with_capacity(config.services.len());
        for service in &config.services {
            let service_scope = scope.child(service.name.as_str());
            debug!(service = %service.name, kind = %service.kind, "Composing service");
            let composed = match service.kind {
                ServiceKind::Static => ServiceTopology::Static(StaticSite::build(
                    &service_scope,
                    &mut manifest,
                    Arc::clone(&zone),
                    config,
                    service,
                )?),
                ServiceKind::Service | ServiceKind::Web => {
                    ServiceTopology::Staged(StagedService::build(
                        &service_scope,
                        &mut manifest,
                        &network,
                        Arc::clone(&edge),
                        Arc::clone(&zone),
                        config,
                        service,
                    )?)
                }
            };
            services.push(composed);
        }

        add_outputs(&mut manifest, &config.stack_name, &edge, &zone)?;
        manifest.check_references()?;

        info!(
            stack = %config.stack_name,
            services = services.len(),
            resources = manifest.len(),
            "Composed region"
        );

        Ok(RegionTopology {
            manifest,
            network,
            edge,
            zone,
            services,
        })
    }
}

/// Validate (unless disabled) and compose.
pub fn synthesize(config: &RegionConfig, options: SynthOptions) -> TopologyResult<RegionTopology> {
    if options.validate {
        validate_topology(config)?;
    } else {
        debug!(stack = %config.stack_name, "Skipping topology validation");
    }
    Ok(RegionStack::build(config)?)
}

fn add_outputs(
    manifest: &mut Manifest,
    stack_name: &str,
    edge: &SharedEdge,
    zone: &SharedZone,
) -> Result<()> {
    let outputs = [
        ("LoadBalancerDnsName", edge.dns_name(), "Load balancer DNS name"),
        ("HostedZoneId", zone.hosted_zone_id(), "Hosted zone id"),
        (
            "NameServers",
            Expr::join_list(",", Expr::get_att(&zone.hosted_zone, "NameServers")),
            "Name servers to delegate the zone to",
        ),
    ];
    for (name, value, description) in outputs {
        manifest.add_output(
            LogicalId::named(name)?,
            Output {
                value,
                description: Some(description.to_string()),
                export: Some(OutputExport {
                    name: format!("{}-{}", stack_name, name),
                }),
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopologyError;
    use serde_json::{Value, json};
    use stagecraft_config::{ConfigError, ConfigFormat, StageName, parse_str};

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

    fn config(doc: Value) -> RegionConfig {
        parse_str(&doc.to_string(), ConfigFormat::Json, Vec::new()).unwrap()
    }

    fn scenario_a() -> RegionConfig {
        config(json!({
            "stackName": "acme",
            "zoneName": "example.com",
            "certificateArn": "arn:aws:acm:us-east-1:1:certificate/abc",
            "mxRecords": null,
            "services": [
                { "name": "web", "configKey": "webService", "kind": "service" },
                { "name": "api", "configKey": "apiService", "kind": "service" }
            ],
            "webService": service_block("web", 10, 20),
            "apiService": service_block("api", 30, 40)
        }))
    }

    fn a_records(manifest: &Manifest) -> usize {
        manifest
            .resources_of_type("AWS::Route53::RecordSet")
            .filter(|r| r.properties["Type"] == "A")
            .count()
    }

    #[test]
    fn test_two_fleet_services() {
        let topology = synthesize(&scenario_a(), SynthOptions::default()).unwrap();
        let manifest = &topology.manifest;
        assert_eq!(manifest.count_of_type("AWS::CodePipeline::Pipeline"), 2);
        assert_eq!(manifest.count_of_type("AWS::CodeDeploy::DeploymentGroup"), 4);
        assert_eq!(manifest.count_of_type("AWS::ElasticLoadBalancingV2::ListenerRule"), 4);
        assert_eq!(manifest.count_of_type("AWS::ElasticLoadBalancingV2::LoadBalancer"), 1);
        assert_eq!(manifest.count_of_type("AWS::Route53::HostedZone"), 1);
        assert_eq!(a_records(manifest), 4);

        let priorities: Vec<_> = manifest
            .resources_of_type("AWS::ElasticLoadBalancingV2::ListenerRule")
            .map(|r| r.properties["Priority"].as_u64().unwrap())
            .collect();
        assert_eq!(priorities, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_no_mx_record_when_absent() {
        let topology = RegionStack::build(&scenario_a()).unwrap();
        assert!(topology.zone.mx_record.is_none());
        assert!(
            !topology
                .manifest
                .resources_of_type("AWS::Route53::RecordSet")
                .any(|r| r.properties["Type"] == "MX")
        );
    }

    #[test]
    fn test_shared_edge_and_zone() {
        let topology = RegionStack::build(&scenario_a()).unwrap();
        for service in &topology.services {
            match service {
                ServiceTopology::Staged(s) => {
                    assert!(Arc::ptr_eq(&s.edge, &topology.edge));
                    assert!(Arc::ptr_eq(&s.zone, &topology.zone));
                }
                ServiceTopology::Static(s) => assert!(Arc::ptr_eq(&s.zone, &topology.zone)),
            }
        }
        assert_eq!(Arc::strong_count(&topology.edge), 3);
    }

    #[test]
    fn test_duplicate_priority_only_caught_by_validation() {
        let mut doc = json!({
            "stackName": "acme",
            "zoneName": "example.com",
            "certificateArn": "arn:cert",
            "services": [
                { "name": "web", "configKey": "webService", "kind": "service" },
                { "name": "api", "configKey": "apiService", "kind": "service" }
            ],
            "webService": service_block("web", 10, 20),
            "apiService": service_block("api", 30, 40)
        });
        doc["apiService"]["stages"]["staging"]["priority"] = json!(10);
        let config = config(doc);

        let unchecked = synthesize(&config, SynthOptions { validate: false }).unwrap();
        let tens = unchecked
            .manifest
            .resources_of_type("AWS::ElasticLoadBalancingV2::ListenerRule")
            .filter(|r| r.properties["Priority"] == 10)
            .count();
        assert_eq!(tens, 2);

        let err = synthesize(&config, SynthOptions::default()).unwrap_err();
        assert!(matches!(err, TopologyError::Config(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_shared_cname_record_rejected() {
        let mut web = service_block("web", 10, 20);
        web["stages"]["staging"]["hostName"] = json!("staging.example.com");
        web["stages"]["production"]["hostName"] = json!("example.com");
        web["stages"]["staging"]["cname"] = json!({ "recordName": "www", "priority": 30 });
        web["stages"]["production"]["cname"] = json!({ "recordName": "www", "priority": 40 });
        let config = config(json!({
            "stackName": "acme",
            "zoneName": "example.com",
            "certificateArn": "arn:cert",
            "services": [{ "name": "web", "configKey": "webService", "kind": "service" }],
            "webService": web
        }));

        let unchecked = RegionStack::build(&config).unwrap();
        let cnames: Vec<_> = unchecked
            .manifest
            .resources_of_type("AWS::Route53::RecordSet")
            .filter(|r| r.properties["Type"] == "CNAME")
            .map(|r| r.properties["Name"].clone())
            .collect();
        assert_eq!(cnames, vec![json!("www.example.com."), json!("www.example.com.")]);

        let err = synthesize(&config, SynthOptions::default()).unwrap_err();
        assert!(matches!(err, TopologyError::Config(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_deterministic() {
        let config = scenario_a();
        let first = RegionStack::build(&config).unwrap();
        let second = RegionStack::build(&config).unwrap();
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(
            first.manifest.digest().unwrap(),
            second.manifest.digest().unwrap()
        );
    }

    #[test]
    fn test_zone_created_before_records() {
        let topology = RegionStack::build(&scenario_a()).unwrap();
        let order = topology.manifest.creation_order().unwrap();
        let position = |id: &LogicalId| order.iter().position(|o| o == id).unwrap();
        let zone = position(&topology.zone.hosted_zone);
        for record in topology.manifest.resources_of_type("AWS::Route53::RecordSet") {
            assert!(zone < position(&record.id));
        }
        let lb = position(&topology.edge.load_balancer);
        for rule in topology
            .manifest
            .resources_of_type("AWS::ElasticLoadBalancingV2::ListenerRule")
        {
            assert!(lb < position(&rule.id));
        }
    }

    #[test]
    fn test_outputs_exported() {
        let topology = RegionStack::build(&scenario_a()).unwrap();
        let template = topology.manifest.to_template().unwrap();
        let outputs = &template["Outputs"];
        assert_eq!(outputs["LoadBalancerDnsName"]["Export"]["Name"], "acme-LoadBalancerDnsName");
        assert_eq!(
            outputs["NameServers"]["Value"]["Fn::Join"][1]["Fn::GetAtt"][1],
            "NameServers"
        );
        assert_eq!(outputs["HostedZoneId"]["Value"]["Ref"], topology.zone.hosted_zone.as_str());
    }

    #[test]
    fn test_default_services_from_context() {
        let mut web = service_block("www", 10, 20);
        web["stages"]["staging"]["staticAssetsHostName"] = json!("static-staging.example.com");
        web["stages"]["production"]["staticAssetsHostName"] = json!("static.example.com");
        let assets = service_block("assets", 0, 0);
        let topology = synthesize(
            &config(json!({
                "stackName": "acme",
                "zoneName": "example.com",
                "certificateArn": "arn:cert",
                "mxRecords": [{ "priority": 10, "hostName": "mx.example.com" }],
                "webService": web,
                "apiService": service_block("api", 30, 40),
                "staticAssets": assets
            })),
            SynthOptions::default(),
        )
        .unwrap();

        let summaries = topology.summaries();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["web-service", "api-service", "static-assets"]);
        assert_eq!(summaries[0].kind, ServiceKind::Web);
        assert!(summaries[0].hosts.contains(&"static.example.com".to_string()));
        assert_eq!(summaries[2].kind, ServiceKind::Static);
        assert_eq!(topology.manifest.count_of_type("AWS::CodePipeline::Pipeline"), 3);
        assert_eq!(topology.manifest.count_of_type("AWS::CloudFront::Distribution"), 4);
        assert_eq!(topology.manifest.count_of_type("AWS::CodeDeploy::DeploymentGroup"), 4);
        assert!(topology.zone.mx_record.is_some());

        let web = match topology.service("web-service").unwrap() {
            ServiceTopology::Staged(s) => s,
            ServiceTopology::Static(_) => panic!("web service composed as static"),
        };
        assert_eq!(web.routing(StageName::Production).unwrap().host, "www.example.com");
    }
}
