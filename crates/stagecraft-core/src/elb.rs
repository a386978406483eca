//! Application load balancer resources.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    #[serde(rename = "Type")]
    pub kind: String,
    pub scheme: String,
    pub subnets: Vec<Expr>,
    pub security_groups: Vec<Expr>,
}

impl ResourceType for LoadBalancer {
    const TYPE: &'static str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub load_balancer_arn: Expr,
    pub port: u16,
    pub protocol: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<ListenerCertificate>,
    pub default_actions: Vec<ListenerAction>,
}

impl ResourceType for Listener {
    const TYPE: &'static str = "AWS::ElasticLoadBalancingV2::Listener";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerCertificate {
    pub certificate_arn: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerRule {
    pub listener_arn: Expr,
    pub priority: u32,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<ListenerAction>,
}

impl ResourceType for ListenerRule {
    const TYPE: &'static str = "AWS::ElasticLoadBalancingV2::ListenerRule";
}

impl ListenerRule {
    /// Forward requests for `host` to a target group.
    pub fn forward_host(listener: Expr, host: &str, priority: u32, target_group: Expr) -> Self {
        Self {
            listener_arn: listener,
            priority,
            conditions: vec![RuleCondition::host_header(host)],
            actions: vec![ListenerAction::forward(target_group)],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleCondition {
    pub field: String,
    pub host_header_config: HostHeaderConfig,
}

impl RuleCondition {
    pub fn host_header(host: &str) -> Self {
        Self {
            field: "host-header".to_string(),
            host_header_config: HostHeaderConfig {
                values: vec![host.to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostHeaderConfig {
    pub values: Vec<String>,
}

/// A listener or rule action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerAction {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_response_config: Option<FixedResponseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_config: Option<RedirectConfig>,
}

impl ListenerAction {
    pub fn forward(target_group: Expr) -> Self {
        Self {
            kind: "forward".to_string(),
            target_group_arn: Some(target_group),
            fixed_response_config: None,
            redirect_config: None,
        }
    }

    pub fn fixed_response(status_code: &str) -> Self {
        Self {
            kind: "fixed-response".to_string(),
            target_group_arn: None,
            fixed_response_config: Some(FixedResponseConfig {
                status_code: status_code.to_string(),
            }),
            redirect_config: None,
        }
    }

    /// Permanent redirect of any request to the same host, path and query over HTTPS.
    pub fn redirect_to_https() -> Self {
        Self {
            kind: "redirect".to_string(),
            target_group_arn: None,
            fixed_response_config: None,
            redirect_config: Some(RedirectConfig {
                protocol: "HTTPS".to_string(),
                host: "#{host}".to_string(),
                path: "/#{path}".to_string(),
                query: "#{query}".to_string(),
                port: "443".to_string(),
                status_code: "HTTP_301".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FixedResponseConfig {
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedirectConfig {
    pub protocol: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub port: String,
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroup {
    pub port: u16,
    pub protocol: String,
    pub target_type: String,
    pub vpc_id: Expr,
    pub health_check_enabled: bool,
    pub health_check_path: String,
    pub health_check_port: String,
    pub health_check_protocol: String,
    pub health_check_timeout_seconds: u32,
    pub health_check_interval_seconds: u32,
    pub healthy_threshold_count: u32,
    pub unhealthy_threshold_count: u32,
    pub target_group_attributes: Vec<TargetGroupAttribute>,
}

impl ResourceType for TargetGroup {
    const TYPE: &'static str = "AWS::ElasticLoadBalancingV2::TargetGroup";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroupAttribute {
    pub key: String,
    pub value: String,
}
