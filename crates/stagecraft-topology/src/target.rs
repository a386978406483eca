//! One stage fleet behind the shared load balancer.

use stagecraft_config::StageName;
use stagecraft_core::artifact::Artifact;
use stagecraft_core::compute::{
    AMAZON_LINUX_AMI_PARAMETER, AMI_PARAMETER_TYPE, AsgTag, AutoScalingGroup, LaunchConfiguration,
    UserData,
};
use stagecraft_core::deployer::{
    AutoRollbackConfiguration, DeploymentGroup, DeploymentStrategy, DeploymentStyle, FleetSize,
    HealthCheck, LoadBalancerInfo, TargetGroupInfo,
};
use stagecraft_core::elb::{TargetGroup, TargetGroupAttribute};
use stagecraft_core::iam::{InstanceProfile, Policy, PolicyDocument, Role, Statement};
use stagecraft_core::manifest::Parameter;
use stagecraft_core::network::{IngressRule, SecurityGroup};
use stagecraft_core::pipeline::Action;
use stagecraft_core::{Expr, LogicalId, Manifest, Result, Scope};
use tracing::info;

use crate::edge::SharedEdge;
use crate::network::Network;

pub const INSTANCE_TYPE: &str = "t3.micro";
pub const DEREGISTRATION_DELAY_SECONDS: u32 = 60;

/// Parameter resolving the latest Amazon Linux image at apply time.
pub fn ami_parameter_id() -> LogicalId {
    LogicalId::from_path(&["LatestAmazonLinuxAmi"])
}

/// Commands run once when an instance first boots.
pub fn bootstrap_user_data() -> UserData {
    let mut user_data = UserData::for_linux();
    user_data.add_commands([
        "curl --silent --location https://rpm.nodesource.com/setup_12.x | bash -",
        "yum -y update",
        "yum install -y nodejs",
        "npm install -g pm2",
        "mkdir -p /home/ec2-user/app/keys",
        "cd /home/ec2-user/app/keys",
        "openssl req -new -newkey rsa:4096 -days 365 -nodes -x509 -subj \"/C=/ST=/L=/O=/CN=localhost\" -keyout key.pem -out cert.pem",
        "mkdir -p /home/ec2-user/app/logs",
        "chown -R ec2-user:ec2-user /home/ec2-user/app",
        // Deploy agent
        "yum install -y ruby wget",
        "cd /tmp",
        "aws s3 cp s3://aws-codedeploy-${AWS::Region}/latest/install . --region ${AWS::Region}",
        "chmod +x ./install",
        "./install auto",
        "rm -f ./install",
    ]);
    user_data
}

/// Inputs shared by both stages of a service.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext<'a> {
    pub network: &'a Network,
    pub edge: &'a SharedEdge,
    pub application: &'a LogicalId,
    pub deploy_role: &'a LogicalId,
    pub artifact_bucket: &'a LogicalId,
    pub artifact: &'a Artifact,
}

/// A stage fleet: launch configuration, auto-scaling group, target group
/// and the deployment group that deploys onto it.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub stage: StageName,
    pub target_group: LogicalId,
    pub auto_scaling_group: LogicalId,
    pub deployment_group: LogicalId,
    pub security_group: LogicalId,
    pub instance_role: LogicalId,
    pub health_check: HealthCheck,
    pub fleet_size: FleetSize,
    /// Pipeline action deploying the build artifact to this fleet.
    pub deploy_action: Action,
}

impl DeploymentTarget {
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        ctx: TargetContext<'_>,
        stage: StageName,
    ) -> Result<Self> {
        let health_check = HealthCheck::stage_default();
        let fleet_size = FleetSize::SINGLE;

        let ami = ami_parameter_id();
        if !manifest.contains(&ami) {
            manifest.add_parameter(
                ami.clone(),
                Parameter {
                    type_name: AMI_PARAMETER_TYPE.to_string(),
                    default: Some(AMAZON_LINUX_AMI_PARAMETER.to_string()),
                    description: Some("Latest Amazon Linux image".to_string()),
                },
            )?;
        }

        let security_group = manifest.add(
            scope.id("fleet-security-group"),
            &SecurityGroup {
                group_description: format!("{} fleet", scope.prefix()),
                vpc_id: ctx.network.vpc_id(),
                security_group_ingress: vec![IngressRule::tcp_from_group(
                    health_check.port,
                    ctx.edge.security_group_id(),
                    "Load balancer to fleet",
                )],
            },
        )?;

        let instance_role = manifest.add(
            scope.id("instance-role"),
            &Role::for_service("ec2.amazonaws.com"),
        )?;
        manifest.add(
            scope.id("instance-policy"),
            &Policy {
                policy_name: scope.name("instance"),
                policy_document: PolicyDocument::new(vec![Statement::allow(
                    &["s3:GetObject", "s3:GetObjectVersion", "s3:ListBucket"],
                    vec![
                        Expr::get_att(ctx.artifact_bucket, "Arn"),
                        Expr::join(
                            "",
                            vec![Expr::get_att(ctx.artifact_bucket, "Arn"), "/*".into()],
                        ),
                        Expr::Sub(
                            "arn:${AWS::Partition}:s3:::aws-codedeploy-${AWS::Region}/*"
                                .to_string(),
                        ),
                    ],
                )]),
                roles: vec![Expr::reference(&instance_role)],
            },
        )?;
        let instance_profile = manifest.add(
            scope.id("instance-profile"),
            &InstanceProfile {
                roles: vec![Expr::reference(&instance_role)],
            },
        )?;

        let launch_configuration = manifest.add(
            scope.id("launch-configuration"),
            &LaunchConfiguration {
                image_id: Expr::reference(&ami),
                instance_type: INSTANCE_TYPE.to_string(),
                associate_public_ip_address: true,
                iam_instance_profile: Expr::reference(&instance_profile),
                security_groups: vec![Expr::get_att(&security_group, "GroupId")],
                user_data: bootstrap_user_data().to_expr(),
            },
        )?;

        let target_group = manifest.add(
            scope.id("lb-fleet"),
            &TargetGroup {
                port: health_check.port,
                protocol: "HTTPS".to_string(),
                target_type: "instance".to_string(),
                vpc_id: ctx.network.vpc_id(),
                health_check_enabled: true,
                health_check_path: health_check.path.clone(),
                health_check_port: health_check.port.to_string(),
                health_check_protocol: "HTTPS".to_string(),
                health_check_timeout_seconds: health_check.timeout_seconds,
                health_check_interval_seconds: health_check.interval_seconds,
                healthy_threshold_count: health_check.healthy_threshold,
                unhealthy_threshold_count: health_check.unhealthy_threshold,
                target_group_attributes: vec![TargetGroupAttribute {
                    key: "deregistration_delay.timeout_seconds".to_string(),
                    value: DEREGISTRATION_DELAY_SECONDS.to_string(),
                }],
            },
        )?;

        let auto_scaling_group = manifest.add(
            scope.id("asg"),
            &AutoScalingGroup {
                min_size: fleet_size.min.to_string(),
                max_size: fleet_size.max.to_string(),
                launch_configuration_name: Expr::reference(&launch_configuration),
                vpc_zone_identifier: ctx.network.public_subnet_ids(),
                target_group_arns: vec![Expr::reference(&target_group)],
                tags: vec![AsgTag {
                    key: "Name".to_string(),
                    value: scope.prefix(),
                    propagate_at_launch: true,
                }],
            },
        )?;

        let deployment_group = manifest.add(
            scope.id("deployment-group"),
            &DeploymentGroup {
                application_name: Expr::reference(ctx.application),
                deployment_group_name: stage.to_string(),
                service_role_arn: Expr::get_att(ctx.deploy_role, "Arn"),
                auto_scaling_groups: vec![Expr::reference(&auto_scaling_group)],
                deployment_config_name: DeploymentStrategy::AllAtOnce.config_name().to_string(),
                deployment_style: DeploymentStyle::in_place_with_traffic_control(),
                load_balancer_info: LoadBalancerInfo {
                    target_group_info_list: vec![TargetGroupInfo {
                        name: Expr::get_att(&target_group, "TargetGroupName"),
                    }],
                },
                auto_rollback_configuration: AutoRollbackConfiguration::disabled(),
            },
        )?;

        let deploy_action = Action::codedeploy(
            &scope.name("codedeploy"),
            &Expr::reference(ctx.application),
            &Expr::reference(&deployment_group),
            ctx.artifact.clone(),
        );

        info!(stage = %stage, target_group = %target_group, "Built deployment target");

        Ok(Self {
            stage,
            target_group,
            auto_scaling_group,
            deployment_group,
            security_group,
            instance_role,
            health_check,
            fleet_size,
            deploy_action,
        })
    }

    pub fn target_group_arn(&self) -> Expr {
        Expr::reference(&self.target_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecraft_core::deployer::Application;
    use stagecraft_core::storage::Bucket;

    fn build_targets() -> (Manifest, Vec<DeploymentTarget>) {
        let scope = Scope::root("acme");
        let mut manifest = Manifest::default();
        let network = Network::build(&scope, &mut manifest, 2).unwrap();
        let edge = SharedEdge::build(&scope, &mut manifest, &network, &[Expr::from("arn")]).unwrap();
        let service = scope.child("api");
        let application = manifest
            .add(service.id("codedeploy-application"), &Application::server())
            .unwrap();
        let deploy_role = manifest
            .add(service.id("deploy-role"), &Role::for_service("codedeploy.amazonaws.com"))
            .unwrap();
        let bucket = manifest.add(service.id("artifacts"), &Bucket::private()).unwrap();
        let artifact = Artifact::new("service");
        let ctx = TargetContext {
            network: &network,
            edge: &edge,
            application: &application,
            deploy_role: &deploy_role,
            artifact_bucket: &bucket,
            artifact: &artifact,
        };
        let targets = StageName::ALL
            .iter()
            .map(|stage| {
                DeploymentTarget::build(&service.child(stage.as_str()), &mut manifest, ctx, *stage)
                    .unwrap()
            })
            .collect();
        (manifest, targets)
    }

    #[test]
    fn test_health_contract() {
        let (manifest, targets) = build_targets();
        for target in &targets {
            let tg = manifest.get(&target.target_group).unwrap();
            assert_eq!(tg.properties["Port"], 8443);
            assert_eq!(tg.properties["Protocol"], "HTTPS");
            assert_eq!(tg.properties["HealthCheckPath"], "/_health");
            assert_eq!(tg.properties["HealthCheckPort"], "8443");
            assert_eq!(tg.properties["HealthCheckTimeoutSeconds"], 2);
            assert_eq!(tg.properties["HealthCheckIntervalSeconds"], 5);
            assert_eq!(tg.properties["HealthyThresholdCount"], 2);
            assert_eq!(tg.properties["UnhealthyThresholdCount"], 2);
            assert_eq!(tg.properties["TargetGroupAttributes"][0]["Value"], "60");
        }
    }

    #[test]
    fn test_fleet_of_one() {
        let (manifest, targets) = build_targets();
        for target in &targets {
            let asg = manifest.get(&target.auto_scaling_group).unwrap();
            assert_eq!(asg.properties["MinSize"], "1");
            assert_eq!(asg.properties["MaxSize"], "1");
        }
        assert_eq!(manifest.parameters().len(), 1);
    }

    #[test]
    fn test_deployment_group_named_after_stage() {
        let (manifest, targets) = build_targets();
        let names: Vec<_> = targets
            .iter()
            .map(|t| manifest.get(&t.deployment_group).unwrap().properties["DeploymentGroupName"].clone())
            .collect();
        assert_eq!(names, vec!["staging", "production"]);
        let group = manifest.get(&targets[0].deployment_group).unwrap();
        assert_eq!(group.properties["DeploymentConfigName"], "CodeDeployDefault.AllAtOnce");
        assert_eq!(group.properties["DeploymentStyle"]["DeploymentType"], "IN_PLACE");
        assert_eq!(targets[0].deploy_action.name, "acme-api-staging-codedeploy");
    }

    #[test]
    fn test_stages_symmetric() {
        let (manifest, targets) = build_targets();
        let strip = |t: &DeploymentTarget| {
            let mut tg = manifest.get(&t.target_group).unwrap().properties.clone();
            tg.as_object_mut().unwrap().remove("VpcId");
            tg
        };
        assert_eq!(strip(&targets[0]), strip(&targets[1]));
        assert_eq!(targets[0].health_check, targets[1].health_check);
        assert_eq!(targets[0].fleet_size, targets[1].fleet_size);
    }

    #[test]
    fn test_bootstrap_script() {
        let script = bootstrap_user_data().render();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("setup_12.x"));
        assert!(script.contains("npm install -g pm2"));
        assert!(script.contains("rsa:4096"));
        assert!(script.contains("/home/ec2-user/app/logs"));
        assert!(script.contains("./install auto"));
    }

    #[test]
    fn test_instance_role_is_scoped() {
        let (manifest, targets) = build_targets();
        assert!(manifest.check_references().is_ok());
        let role = manifest.get(&targets[0].instance_role).unwrap();
        assert!(role.property("ManagedPolicyArns").is_none());
    }
}
