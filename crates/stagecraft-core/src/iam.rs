//! IAM roles and policies.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<Expr>,
}

impl ResourceType for Role {
    const TYPE: &'static str = "AWS::IAM::Role";
}

impl Role {
    /// A role assumable by an AWS service principal, e.g. `ec2.amazonaws.com`.
    pub fn for_service(service: &str) -> Self {
        Self {
            assume_role_policy_document: PolicyDocument::new(vec![Statement {
                effect: Effect::Allow,
                action: vec!["sts:AssumeRole".to_string()],
                resource: None,
                principal: Some(Principal::Service {
                    service: service.to_string(),
                }),
            }]),
            managed_policy_arns: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, policy_name: &str) -> Self {
        self.managed_policy_arns.push(Expr::Sub(format!(
            "arn:${{AWS::Partition}}:iam::aws:policy/{}",
            policy_name
        )));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<Expr>,
}

impl ResourceType for Policy {
    const TYPE: &'static str = "AWS::IAM::Policy";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfile {
    pub roles: Vec<Expr>,
}

impl ResourceType for InstanceProfile {
    const TYPE: &'static str = "AWS::IAM::InstanceProfile";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<Expr>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl Statement {
    pub fn allow(actions: &[&str], resources: Vec<Expr>) -> Self {
        Self {
            effect: Effect::Allow,
            action: actions.iter().map(|a| a.to_string()).collect(),
            resource: Some(resources),
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Principal {
    Service {
        #[serde(rename = "Service")]
        service: String,
    },
    /// `"*"`, anyone.
    Anyone(String),
}

impl Principal {
    pub fn anyone() -> Self {
        Principal::Anyone("*".to_string())
    }
}
