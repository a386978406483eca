//! Pipeline and stage definitions.
//!
//! A pipeline is Source → Build → one deploy stage per environment. Stages
//! run strictly in declaration order; a stage starts only after every action
//! of the previous stage succeeded.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Expr;
use crate::artifact::{Artifact, ArtifactStore};
use crate::manifest::ResourceType;
use crate::repository::SourceRepository;

/// A CI/CD pipeline definition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pipeline {
    /// Pipeline name (e.g., "acme-web-pipeline").
    pub name: String,
    pub role_arn: Expr,
    pub artifact_store: ArtifactStore,
    /// Pipeline stages, in execution order.
    pub stages: Vec<Stage>,
}

impl ResourceType for Pipeline {
    const TYPE: &'static str = "AWS::CodePipeline::Pipeline";
}

impl Pipeline {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A stage in a pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }
}

/// What an action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

/// An action inside a stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    pub name: String,
    pub action_type_id: ActionTypeId,
    pub configuration: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_artifacts: Vec<Artifact>,
    pub run_order: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionTypeId {
    pub category: ActionCategory,
    pub owner: String,
    pub provider: String,
    pub version: String,
}

impl ActionTypeId {
    fn new(category: ActionCategory, owner: &str, provider: &str) -> Self {
        Self {
            category,
            owner: owner.to_string(),
            provider: provider.to_string(),
            version: "1".to_string(),
        }
    }
}

impl Action {
    /// Webhook-triggered checkout of a repository branch.
    pub fn github_source(name: &str, source: &SourceRepository, output: Artifact) -> Self {
        let mut configuration = Map::new();
        configuration.insert("Owner".into(), Value::String(source.owner.clone()));
        configuration.insert("Repo".into(), Value::String(source.repo.clone()));
        configuration.insert("Branch".into(), Value::String(source.branch.clone()));
        configuration.insert(
            "OAuthToken".into(),
            Value::String(source.token.dynamic_reference()),
        );
        configuration.insert("PollForSourceChanges".into(), Value::Bool(false));
        Self {
            name: name.to_string(),
            action_type_id: ActionTypeId::new(ActionCategory::Source, "ThirdParty", "GitHub"),
            configuration,
            input_artifacts: Vec::new(),
            output_artifacts: vec![output],
            run_order: 1,
        }
    }

    pub fn codebuild(name: &str, project: &Expr, input: Artifact, outputs: Vec<Artifact>) -> Self {
        let mut configuration = Map::new();
        configuration.insert("ProjectName".into(), project.to_value());
        Self {
            name: name.to_string(),
            action_type_id: ActionTypeId::new(ActionCategory::Build, "AWS", "CodeBuild"),
            configuration,
            input_artifacts: vec![input],
            output_artifacts: outputs,
            run_order: 1,
        }
    }

    /// In-place deploy of an artifact to a deployment group.
    pub fn codedeploy(name: &str, application: &Expr, group: &Expr, input: Artifact) -> Self {
        let mut configuration = Map::new();
        configuration.insert("ApplicationName".into(), application.to_value());
        configuration.insert("DeploymentGroupName".into(), group.to_value());
        Self {
            name: name.to_string(),
            action_type_id: ActionTypeId::new(ActionCategory::Deploy, "AWS", "CodeDeploy"),
            configuration,
            input_artifacts: vec![input],
            output_artifacts: Vec::new(),
            run_order: 1,
        }
    }

    /// Extract an artifact into a bucket.
    pub fn s3_deploy(name: &str, bucket: &Expr, input: Artifact) -> Self {
        let mut configuration = Map::new();
        configuration.insert("BucketName".into(), bucket.to_value());
        configuration.insert("Extract".into(), Value::String("true".to_string()));
        Self {
            name: name.to_string(),
            action_type_id: ActionTypeId::new(ActionCategory::Deploy, "AWS", "S3"),
            configuration,
            input_artifacts: vec![input],
            output_artifacts: Vec::new(),
            run_order: 1,
        }
    }

    pub fn category(&self) -> ActionCategory {
        self.action_type_id.category
    }
}

/// Registers a push webhook with the source provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Webhook {
    pub authentication: String,
    pub authentication_configuration: WebhookAuthConfiguration,
    pub filters: Vec<WebhookFilter>,
    pub target_pipeline: Expr,
    pub target_action: String,
    pub target_pipeline_version: u32,
    pub register_with_third_party: bool,
}

impl ResourceType for Webhook {
    const TYPE: &'static str = "AWS::CodePipeline::Webhook";
}

impl Webhook {
    pub fn github_push(pipeline: Expr, source_action: &str, source: &SourceRepository) -> Self {
        Self {
            authentication: "GITHUB_HMAC".to_string(),
            authentication_configuration: WebhookAuthConfiguration {
                secret_token: source.token.dynamic_reference(),
            },
            filters: vec![WebhookFilter {
                json_path: "$.ref".to_string(),
                match_equals: source.branch_ref(),
            }],
            target_pipeline: pipeline,
            target_action: source_action.to_string(),
            target_pipeline_version: 1,
            register_with_third_party: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookAuthConfiguration {
    pub secret_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookFilter {
    pub json_path: String,
    pub match_equals: String,
}

/// Build project executed by the Build stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildProject {
    pub service_role: Expr,
    pub source: BuildSource,
    pub artifacts: BuildArtifacts,
    pub environment: BuildEnvironment,
}

impl ResourceType for BuildProject {
    const TYPE: &'static str = "AWS::CodeBuild::Project";
}

impl BuildProject {
    /// A project driven by the pipeline, reading its steps from `build_spec`.
    pub fn for_pipeline(service_role: Expr, build_spec: &str) -> Self {
        Self {
            service_role,
            source: BuildSource {
                kind: "CODEPIPELINE".to_string(),
                build_spec: build_spec.to_string(),
            },
            artifacts: BuildArtifacts {
                kind: "CODEPIPELINE".to_string(),
            },
            environment: BuildEnvironment {
                kind: "LINUX_CONTAINER".to_string(),
                compute_type: "BUILD_GENERAL1_SMALL".to_string(),
                image: "aws/codebuild/standard:2.0".to_string(),
                privileged_mode: false,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildSource {
    #[serde(rename = "Type")]
    pub kind: String,
    pub build_spec: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildArtifacts {
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildEnvironment {
    #[serde(rename = "Type")]
    pub kind: String,
    pub compute_type: String,
    pub image: String,
    pub privileged_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretRef;

    fn source() -> SourceRepository {
        SourceRepository {
            provider: Default::default(),
            owner: "acme".to_string(),
            repo: "web".to_string(),
            branch: "main".to_string(),
            token: SecretRef::new("gh-token", "token"),
        }
    }

    #[test]
    fn test_source_action_uses_dynamic_token() {
        let action = Action::github_source("Source", &source(), Artifact::new("source"));
        assert_eq!(action.category(), ActionCategory::Source);
        assert_eq!(action.configuration["Branch"], "main");
        assert_eq!(
            action.configuration["OAuthToken"],
            "{{resolve:secretsmanager:gh-token:SecretString:token}}"
        );
        assert_eq!(action.configuration["PollForSourceChanges"], false);
    }

    #[test]
    fn test_webhook_filters_branch() {
        let webhook = Webhook::github_push(Expr::from("p"), "Source", &source());
        assert_eq!(webhook.filters[0].match_equals, "refs/heads/main");
        assert!(webhook.register_with_third_party);
    }

    #[test]
    fn test_action_serialization() {
        let action = Action::s3_deploy("deploy", &Expr::from("bucket"), Artifact::new("static"));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["ActionTypeId"]["Category"], "Deploy");
        assert_eq!(value["ActionTypeId"]["Provider"], "S3");
        assert_eq!(value["InputArtifacts"][0]["Name"], "static");
        assert!(value.get("OutputArtifacts").is_none());
    }
}
