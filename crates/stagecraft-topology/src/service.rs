//! Services deployed to a staging and a production fleet.
//!
//! Both fleets sit behind the region's shared load balancer and are fed by
//! one pipeline: Source, Build, then one deploy stage per environment named
//! after its host. Promotion to production is automatic once the staging
//! deploy succeeds.

use std::sync::Arc;

use stagecraft_config::{RegionConfig, ServiceConfig, ServiceKind, StageName};
use stagecraft_core::artifact::BuildOutputs;
use stagecraft_core::deployer::Application;
use stagecraft_core::iam::Role;
use stagecraft_core::{Error, LogicalId, Manifest, Result, Scope};
use tracing::{debug, info};

use crate::dns::SharedZone;
use crate::edge::SharedEdge;
use crate::network::Network;
use crate::pipeline::BuildPipeline;
use crate::static_site::{PublishedBucket, STATIC_ARTIFACT};
use crate::target::{DeploymentTarget, TargetContext};

pub const SERVICE_ARTIFACT: &str = "service";

/// Routing and DNS for one stage of a service.
#[derive(Debug, Clone)]
pub struct StageRouting {
    pub stage: StageName,
    pub host: String,
    pub priority: u32,
    pub rule: LogicalId,
    pub record: LogicalId,
    /// Secondary host, its rule and its CNAME record.
    pub cname: Option<CnameRouting>,
}

#[derive(Debug, Clone)]
pub struct CnameRouting {
    pub host: String,
    pub priority: u32,
    pub rule: LogicalId,
    pub record: LogicalId,
}

/// A two-stage service.
#[derive(Debug)]
pub struct StagedService {
    pub name: String,
    pub kind: ServiceKind,
    pub edge: Arc<SharedEdge>,
    pub zone: Arc<SharedZone>,
    pub pipeline: LogicalId,
    pub application: LogicalId,
    /// Staging first, then production.
    pub targets: Vec<DeploymentTarget>,
    pub routing: Vec<StageRouting>,
    /// Per-stage static asset hosting, `web` services only.
    pub static_assets: Vec<(StageName, PublishedBucket)>,
}

impl StagedService {
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        network: &Network,
        edge: Arc<SharedEdge>,
        zone: Arc<SharedZone>,
        region: &RegionConfig,
        service: &ServiceConfig,
    ) -> Result<Self> {
        let outputs = match service.kind {
            ServiceKind::Web => BuildOutputs::with_assets(SERVICE_ARTIFACT, STATIC_ARTIFACT),
            ServiceKind::Service => BuildOutputs::single(SERVICE_ARTIFACT),
            ServiceKind::Static => {
                return Err(Error::InvalidInput(format!(
                    "service '{}' is static and has no fleet",
                    service.name
                )));
            }
        };

        let mut pipeline = BuildPipeline::new(
            scope,
            manifest,
            service.source.to_repository(),
            service.build_spec(),
            outputs,
        )?;

        let application = manifest.add(
            scope.id("codedeploy-application"),
            &Application::server(),
        )?;
        let deploy_role = manifest.add(
            scope.id("codedeploy-role"),
            &Role::for_service("codedeploy.amazonaws.com")
                .with_managed_policy("service-role/AWSCodeDeployRole"),
        )?;

        let artifact = pipeline.outputs.service.clone();
        let artifact_bucket = pipeline.artifact_bucket.clone();
        let ctx = TargetContext {
            network,
            edge: &edge,
            application: &application,
            deploy_role: &deploy_role,
            artifact_bucket: &artifact_bucket,
            artifact: &artifact,
        };

        let mut targets = Vec::with_capacity(2);
        let mut routing = Vec::with_capacity(2);
        let mut static_assets = Vec::new();

        for (stage, stage_config) in service.stages.iter() {
            let stage_scope = scope.child(stage.as_str());
            let target = DeploymentTarget::build(&stage_scope, manifest, ctx, stage)?;

            let rule = edge.add_host_rule(
                manifest,
                stage_scope.id("listener-rule"),
                &stage_config.host_name,
                stage_config.priority,
                target.target_group_arn(),
            )?;
            let record = zone.add_alias(
                manifest,
                stage_scope.id("alias-record"),
                &stage_config.host_name,
                edge.alias_target(),
            )?;

            // `www`-style secondary name resolving to the same fleet.
            let cname = match (&stage_config.cname, stage_config.cname_host()) {
                (Some(cname), Some(host)) => {
                    let record = zone.add_cname(
                        manifest,
                        stage_scope.id("cname-record"),
                        &cname.record_name,
                        &stage_config.host_name,
                    )?;
                    let rule = edge.add_host_rule(
                        manifest,
                        stage_scope.id("cname-listener-rule"),
                        &host,
                        cname.priority,
                        target.target_group_arn(),
                    )?;
                    debug!(stage = %stage, host = %host, priority = cname.priority, "Added cname layer");
                    Some(CnameRouting {
                        host,
                        priority: cname.priority,
                        rule,
                        record,
                    })
                }
                _ => None,
            };

            let mut actions = Vec::with_capacity(2);
            if service.kind == ServiceKind::Web {
                let host = stage_config.static_assets_host_name.as_deref().ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "stage '{}' of '{}' has no static assets host",
                        stage, service.name
                    ))
                })?;
                let bucket_name = region.bucket_name(service, stage).ok_or_else(|| {
                    Error::InvalidInput(format!("service '{}' has no assets bucket", service.name))
                })?;
                let assets = PublishedBucket::build(
                    &stage_scope.child("static-assets"),
                    manifest,
                    &zone,
                    &bucket_name,
                    host,
                )?;
                pipeline.grant_bucket_write(&assets.bucket);
                actions.push(assets.deploy_action(&stage_scope.name("s3")));
                static_assets.push((stage, assets));
            }
            actions.push(target.deploy_action.clone());
            pipeline.add_stage(stage_config.host_name.clone(), actions);

            routing.push(StageRouting {
                stage,
                host: stage_config.host_name.clone(),
                priority: stage_config.priority,
                rule,
                record,
                cname,
            });
            targets.push(target);
        }

        let pipeline = pipeline.finish(manifest)?;
        info!(service = %service.name, kind = %service.kind, "Built staged service");

        Ok(Self {
            name: service.name.clone(),
            kind: service.kind,
            edge,
            zone,
            pipeline,
            application,
            targets,
            routing,
            static_assets,
        })
    }

    pub fn target(&self, stage: StageName) -> Option<&DeploymentTarget> {
        self.targets.iter().find(|t| t.stage == stage)
    }

    pub fn routing(&self, stage: StageName) -> Option<&StageRouting> {
        self.routing.iter().find(|r| r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecraft_config::{
        CertificateSource, CnameConfig, SourceConfig, StageConfig, StageSet,
    };
    use stagecraft_core::Expr;
    use stagecraft_core::secret::SecretRef;

    fn service(kind: ServiceKind) -> ServiceConfig {
        let stage = |host: &str, priority: u32, assets: &str| StageConfig {
            host_name: host.to_string(),
            priority,
            static_assets_host_name: Some(assets.to_string()),
            cname: None,
        };
        ServiceConfig {
            name: "web-service".to_string(),
            config_key: "webService".to_string(),
            kind,
            source: SourceConfig {
                owner: "acme".to_string(),
                repo: "web".to_string(),
                branch: "main".to_string(),
                token: SecretRef::new("gh", "token"),
            },
            stages: StageSet {
                staging: stage("staging.example.com", 10, "static-staging.example.com"),
                production: stage("example.com", 20, "static.example.com"),
            },
            build_spec: None,
        }
    }

    fn build(service: ServiceConfig) -> (Manifest, StagedService, Arc<SharedEdge>) {
        let region = RegionConfig {
            stack_name: "acme".to_string(),
            zone_name: "example.com".to_string(),
            region: "us-east-1".to_string(),
            max_azs: 2,
            mx_records: None,
            certificate: CertificateSource::Existing {
                arns: vec!["arn:cert".to_string()],
            },
            services: vec![service.clone()],
        };
        let scope = Scope::root("acme");
        let mut manifest = Manifest::default();
        let network = Network::build(&scope, &mut manifest, 2).unwrap();
        let zone =
            SharedZone::build(&scope, &mut manifest, "example.com", &region.certificate, &[])
                .unwrap();
        let edge =
            SharedEdge::build(&scope, &mut manifest, &network, &zone.certificate_arns).unwrap();
        let staged = StagedService::build(
            &scope.child(&service.name),
            &mut manifest,
            &network,
            Arc::clone(&edge),
            zone,
            &region,
            &service,
        )
        .unwrap();
        (manifest, staged, edge)
    }

    #[test]
    fn test_pipeline_stage_order() {
        let (manifest, staged, _) = build(service(ServiceKind::Service));
        let pipeline = manifest.get(&staged.pipeline).unwrap();
        let names: Vec<_> = pipeline.properties["Stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["Name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Source", "Build", "staging.example.com", "example.com"]);
        assert!(!names.iter().any(|n| n.contains("Approval")));
    }

    #[test]
    fn test_rule_and_alias_per_stage() {
        let (manifest, staged, edge) = build(service(ServiceKind::Service));
        assert!(Arc::ptr_eq(&staged.edge, &edge));
        let staging = staged.routing(StageName::Staging).unwrap();
        let rule = manifest.get(&staging.rule).unwrap();
        assert_eq!(rule.properties["Priority"], 10);
        assert_eq!(
            rule.properties["Conditions"][0]["HostHeaderConfig"]["Values"][0],
            "staging.example.com"
        );
        let target = staged.target(StageName::Staging).unwrap();
        assert_eq!(
            rule.properties["Actions"][0]["TargetGroupArn"],
            target.target_group_arn().to_value()
        );

        let record = manifest.get(&staging.record).unwrap();
        assert_eq!(record.properties["Name"], "staging.example.com.");
        assert_eq!(
            record.properties["AliasTarget"]["DNSName"],
            Expr::get_att(&edge.load_balancer, "DNSName").to_value()
        );
        assert_eq!(manifest.count_of_type("AWS::ElasticLoadBalancingV2::ListenerRule"), 2);
        assert_eq!(manifest.count_of_type("AWS::Route53::RecordSet"), 2);
        assert!(manifest.check_references().is_ok());
    }

    #[test]
    fn test_cname_layer() {
        let mut config = service(ServiceKind::Service);
        config.stages.production.cname = Some(CnameConfig {
            record_name: "www".to_string(),
            priority: 50,
        });
        let (manifest, staged, _) = build(config);

        assert!(staged.routing(StageName::Staging).unwrap().cname.is_none());
        let production = staged.routing(StageName::Production).unwrap();
        let cname = production.cname.as_ref().unwrap();
        assert_eq!(cname.host, "www.example.com");

        let record = manifest.get(&cname.record).unwrap();
        assert_eq!(record.properties["Type"], "CNAME");
        assert_eq!(record.properties["Name"], "www.example.com.");
        assert_eq!(record.properties["ResourceRecords"][0], "example.com");

        let rule = manifest.get(&cname.rule).unwrap();
        assert_eq!(rule.properties["Priority"], 50);
        assert_eq!(
            rule.properties["Conditions"][0]["HostHeaderConfig"]["Values"][0],
            "www.example.com"
        );
        let primary = manifest.get(&production.rule).unwrap();
        assert_eq!(
            rule.properties["Actions"][0]["TargetGroupArn"],
            primary.properties["Actions"][0]["TargetGroupArn"]
        );
    }

    #[test]
    fn test_web_static_assets_layer() {
        let (manifest, staged, _) = build(service(ServiceKind::Web));
        assert_eq!(staged.static_assets.len(), 2);
        assert_eq!(
            staged.static_assets[0].1.bucket_name,
            "acme-web-service-staging-static-assets"
        );
        assert_eq!(manifest.count_of_type("AWS::CloudFront::Distribution"), 2);

        let pipeline = manifest.get(&staged.pipeline).unwrap();
        let build = &pipeline.properties["Stages"][1]["Actions"][0];
        assert_eq!(build["OutputArtifacts"].as_array().unwrap().len(), 2);

        let staging = &pipeline.properties["Stages"][2]["Actions"];
        assert_eq!(staging[0]["ActionTypeId"]["Provider"], "S3");
        assert_eq!(staging[0]["InputArtifacts"][0]["Name"], "static");
        assert_eq!(staging[1]["ActionTypeId"]["Provider"], "CodeDeploy");
        assert_eq!(staging[1]["InputArtifacts"][0]["Name"], "service");

        let assets_record = manifest.get(&staged.static_assets[1].1.record).unwrap();
        assert_eq!(assets_record.properties["Name"], "static.example.com.");
        assert!(manifest.check_references().is_ok());
    }

    #[test]
    fn test_static_kind_rejected() {
        let mut config = service(ServiceKind::Static);
        config.name = "site".to_string();
        let region = RegionConfig {
            stack_name: "acme".to_string(),
            zone_name: "example.com".to_string(),
            region: "us-east-1".to_string(),
            max_azs: 1,
            mx_records: None,
            certificate: CertificateSource::Existing {
                arns: vec!["arn".to_string()],
            },
            services: vec![],
        };
        let scope = Scope::root("acme");
        let mut manifest = Manifest::default();
        let network = Network::build(&scope, &mut manifest, 1).unwrap();
        let zone = SharedZone::build(&scope, &mut manifest, "example.com", &region.certificate, &[])
            .unwrap();
        let edge = SharedEdge::build(&scope, &mut manifest, &network, &zone.certificate_arns).unwrap();
        let result =
            StagedService::build(&scope, &mut manifest, &network, edge, zone, &region, &config);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
