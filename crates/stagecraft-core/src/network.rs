//! Network resources: VPC, subnets, routing and security groups.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vpc {
    pub cidr_block: String,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
    pub tags: Vec<Tag>,
}

impl ResourceType for Vpc {
    const TYPE: &'static str = "AWS::EC2::VPC";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InternetGateway {
    pub tags: Vec<Tag>,
}

impl ResourceType for InternetGateway {
    const TYPE: &'static str = "AWS::EC2::InternetGateway";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcGatewayAttachment {
    pub vpc_id: Expr,
    pub internet_gateway_id: Expr,
}

impl ResourceType for VpcGatewayAttachment {
    const TYPE: &'static str = "AWS::EC2::VPCGatewayAttachment";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subnet {
    pub vpc_id: Expr,
    pub cidr_block: String,
    pub availability_zone: Expr,
    pub map_public_ip_on_launch: bool,
    pub tags: Vec<Tag>,
}

impl ResourceType for Subnet {
    const TYPE: &'static str = "AWS::EC2::Subnet";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTable {
    pub vpc_id: Expr,
    pub tags: Vec<Tag>,
}

impl ResourceType for RouteTable {
    const TYPE: &'static str = "AWS::EC2::RouteTable";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Route {
    pub route_table_id: Expr,
    pub destination_cidr_block: String,
    pub gateway_id: Expr,
}

impl ResourceType for Route {
    const TYPE: &'static str = "AWS::EC2::Route";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetRouteTableAssociation {
    pub route_table_id: Expr,
    pub subnet_id: Expr,
}

impl ResourceType for SubnetRouteTableAssociation {
    const TYPE: &'static str = "AWS::EC2::SubnetRouteTableAssociation";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_description: String,
    pub vpc_id: Expr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ingress: Vec<IngressRule>,
}

impl ResourceType for SecurityGroup {
    const TYPE: &'static str = "AWS::EC2::SecurityGroup";
}

/// An inline ingress rule. Either `cidr_ip` or `source_security_group_id` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_security_group_id: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IngressRule {
    /// TCP port open to every IPv4 source.
    pub fn tcp_from_anywhere(port: u16, description: &str) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_ip: Some("0.0.0.0/0".to_string()),
            source_security_group_id: None,
            description: Some(description.to_string()),
        }
    }

    /// TCP port open to members of another security group.
    pub fn tcp_from_group(port: u16, group: Expr, description: &str) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_ip: None,
            source_security_group_id: Some(group),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            key: "Name".to_string(),
            value: value.into(),
        }
    }
}
