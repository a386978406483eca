//! Compute fleet resources.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

/// SSM parameter that always resolves to the latest Amazon Linux AMI.
pub const AMAZON_LINUX_AMI_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2";

/// Template parameter type for an SSM-resolved image id.
pub const AMI_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchConfiguration {
    pub image_id: Expr,
    pub instance_type: String,
    pub associate_public_ip_address: bool,
    pub iam_instance_profile: Expr,
    pub security_groups: Vec<Expr>,
    pub user_data: Expr,
}

impl ResourceType for LaunchConfiguration {
    const TYPE: &'static str = "AWS::AutoScaling::LaunchConfiguration";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingGroup {
    pub min_size: String,
    pub max_size: String,
    pub launch_configuration_name: Expr,
    #[serde(rename = "VPCZoneIdentifier")]
    pub vpc_zone_identifier: Vec<Expr>,
    #[serde(rename = "TargetGroupARNs")]
    pub target_group_arns: Vec<Expr>,
    pub tags: Vec<AsgTag>,
}

impl ResourceType for AutoScalingGroup {
    const TYPE: &'static str = "AWS::AutoScaling::AutoScalingGroup";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsgTag {
    pub key: String,
    pub value: String,
    pub propagate_at_launch: bool,
}

/// A shell script run once when an instance first boots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    lines: Vec<String>,
}

impl UserData {
    pub fn for_linux() -> Self {
        Self {
            lines: vec!["#!/bin/bash".to_string()],
        }
    }

    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(commands.into_iter().map(Into::into));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// Base64 encoded, with `${AWS::Region}` substituted at apply time.
    pub fn to_expr(&self) -> Expr {
        Expr::base64(Expr::Sub(self.render()))
    }
}
