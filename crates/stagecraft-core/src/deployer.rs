//! Deployment application, deployment group and fleet health types.
//!
//! The deployment engine matches an application + deployment group name to
//! a live fleet and deploys the build artifact onto it in place.

use serde::{Deserialize, Serialize};

use crate::Expr;
use crate::manifest::ResourceType;

/// Deployment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentStrategy {
    /// Replace every instance at once.
    #[default]
    AllAtOnce,
    /// Half of the fleet at a time.
    HalfAtATime,
    /// One instance at a time.
    OneAtATime,
}

impl DeploymentStrategy {
    /// Name of the predefined deployment configuration.
    pub fn config_name(&self) -> &'static str {
        match self {
            DeploymentStrategy::AllAtOnce => "CodeDeployDefault.AllAtOnce",
            DeploymentStrategy::HalfAtATime => "CodeDeployDefault.HalfAtATime",
            DeploymentStrategy::OneAtATime => "CodeDeployDefault.OneAtATime",
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub port: u16,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl HealthCheck {
    /// The health contract every stage fleet serves.
    pub fn stage_default() -> Self {
        Self {
            path: "/_health".to_string(),
            port: 8443,
            interval_seconds: 5,
            timeout_seconds: 2,
            healthy_threshold: 2,
            unhealthy_threshold: 2,
        }
    }
}

/// Size of a stage fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSize {
    pub min: u32,
    pub max: u32,
}

impl FleetSize {
    /// One instance, never scaled.
    pub const SINGLE: FleetSize = FleetSize { min: 1, max: 1 };
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub compute_platform: String,
}

impl ResourceType for Application {
    const TYPE: &'static str = "AWS::CodeDeploy::Application";
}

impl Application {
    pub fn server() -> Self {
        Self {
            compute_platform: "Server".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentGroup {
    pub application_name: Expr,
    pub deployment_group_name: String,
    pub service_role_arn: Expr,
    pub auto_scaling_groups: Vec<Expr>,
    pub deployment_config_name: String,
    pub deployment_style: DeploymentStyle,
    pub load_balancer_info: LoadBalancerInfo,
    pub auto_rollback_configuration: AutoRollbackConfiguration,
}

impl ResourceType for DeploymentGroup {
    const TYPE: &'static str = "AWS::CodeDeploy::DeploymentGroup";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentStyle {
    pub deployment_option: String,
    pub deployment_type: String,
}

impl DeploymentStyle {
    pub fn in_place_with_traffic_control() -> Self {
        Self {
            deployment_option: "WITH_TRAFFIC_CONTROL".to_string(),
            deployment_type: "IN_PLACE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerInfo {
    pub target_group_info_list: Vec<TargetGroupInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroupInfo {
    pub name: Expr,
}

/// Automatic rollback is off: a failed deploy surfaces as a deployment
/// group failure and the previous revision is not restored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoRollbackConfiguration {
    pub enabled: bool,
}

impl AutoRollbackConfiguration {
    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}
