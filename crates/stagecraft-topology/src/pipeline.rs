//! Per-service build pipeline.
//!
//! Every pipeline starts with a webhook-triggered Source stage and a Build
//! stage. Services append one deploy stage per environment, then call
//! [`BuildPipeline::finish`] to emit the pipeline resource.

use stagecraft_core::artifact::{Artifact, ArtifactStore, BuildOutputs};
use stagecraft_core::iam::{Policy, PolicyDocument, Role, Statement};
use stagecraft_core::pipeline::{Action, BuildProject, Pipeline, Stage, Webhook};
use stagecraft_core::repository::SourceRepository;
use stagecraft_core::storage::Bucket;
use stagecraft_core::{Expr, LogicalId, Manifest, Result, Scope};
use tracing::{debug, info};

pub const SOURCE_STAGE: &str = "Source";
pub const BUILD_STAGE: &str = "Build";

/// A pipeline under construction.
#[derive(Debug)]
pub struct BuildPipeline {
    scope: Scope,
    pub name: String,
    pub source: SourceRepository,
    pub outputs: BuildOutputs,
    pub artifact_bucket: LogicalId,
    pub role: LogicalId,
    pub build_project: LogicalId,
    stages: Vec<Stage>,
    deploy_buckets: Vec<Expr>,
}

impl BuildPipeline {
    /// Add the artifact bucket, roles and build project, and lay out the
    /// Source and Build stages.
    pub fn new(
        scope: &Scope,
        manifest: &mut Manifest,
        source: SourceRepository,
        build_spec: &str,
        outputs: BuildOutputs,
    ) -> Result<Self> {
        let name = scope.name("pipeline");
        let artifact_bucket = manifest.add(scope.id("artifacts-bucket"), &Bucket::private())?;
        let role = manifest.add(
            scope.id("pipeline-role"),
            &Role::for_service("codepipeline.amazonaws.com"),
        )?;

        let build_role = manifest.add(
            scope.id("codebuild-role"),
            &Role::for_service("codebuild.amazonaws.com"),
        )?;
        manifest.add(
            scope.id("codebuild-policy"),
            &Policy {
                policy_name: scope.name("codebuild"),
                policy_document: PolicyDocument::new(vec![
                    Statement::allow(
                        &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                        vec![Expr::Sub(
                            "arn:${AWS::Partition}:logs:${AWS::Region}:${AWS::AccountId}:log-group:/aws/codebuild/*"
                                .to_string(),
                        )],
                    ),
                    Statement::allow(
                        &["s3:GetObject", "s3:GetObjectVersion", "s3:PutObject"],
                        vec![bucket_objects(&artifact_bucket)],
                    ),
                    // Builds read their settings from the parameter store.
                    Statement::allow(
                        &["ssm:GetParameter"],
                        vec![Expr::Sub(
                            "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/*"
                                .to_string(),
                        )],
                    ),
                ]),
                roles: vec![Expr::reference(&build_role)],
            },
        )?;
        let build_project = manifest.add(
            scope.id("codebuild"),
            &BuildProject::for_pipeline(Expr::get_att(&build_role, "Arn"), build_spec),
        )?;

        let source_output = Artifact::new("source");
        let stages = vec![
            Stage::new(
                SOURCE_STAGE,
                vec![Action::github_source(
                    SOURCE_STAGE,
                    &source,
                    source_output.clone(),
                )],
            ),
            Stage::new(
                BUILD_STAGE,
                vec![Action::codebuild(
                    BUILD_STAGE,
                    &Expr::reference(&build_project),
                    source_output,
                    outputs.all(),
                )],
            ),
        ];

        Ok(Self {
            scope: scope.clone(),
            name,
            source,
            outputs,
            artifact_bucket,
            role,
            build_project,
            stages,
            deploy_buckets: Vec::new(),
        })
    }

    /// Append a deploy stage. Stages run in the order they are added.
    pub fn add_stage(&mut self, name: impl Into<String>, actions: Vec<Action>) {
        let stage = Stage::new(name, actions);
        debug!(pipeline = %self.name, stage = %stage.name, actions = stage.actions.len(), "Added pipeline stage");
        self.stages.push(stage);
    }

    /// Allow the pipeline to publish into a bucket.
    pub fn grant_bucket_write(&mut self, bucket: &LogicalId) {
        self.deploy_buckets.push(bucket_objects(bucket));
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn artifact_bucket_arn(&self) -> Expr {
        Expr::get_att(&self.artifact_bucket, "Arn")
    }

    /// Emit the pipeline, its role policy and the source webhook.
    pub fn finish(self, manifest: &mut Manifest) -> Result<LogicalId> {
        let mut statements = vec![
            Statement::allow(
                &["s3:GetObject", "s3:GetObjectVersion", "s3:GetBucketVersioning", "s3:PutObject"],
                vec![self.artifact_bucket_arn(), bucket_objects(&self.artifact_bucket)],
            ),
            Statement::allow(
                &["codebuild:BatchGetBuilds", "codebuild:StartBuild"],
                vec![Expr::get_att(&self.build_project, "Arn")],
            ),
            Statement::allow(
                &[
                    "codedeploy:CreateDeployment",
                    "codedeploy:GetApplication",
                    "codedeploy:GetApplicationRevision",
                    "codedeploy:GetDeployment",
                    "codedeploy:GetDeploymentConfig",
                    "codedeploy:RegisterApplicationRevision",
                ],
                vec![Expr::Sub(
                    "arn:${AWS::Partition}:codedeploy:${AWS::Region}:${AWS::AccountId}:*"
                        .to_string(),
                )],
            ),
        ];
        if !self.deploy_buckets.is_empty() {
            statements.push(Statement::allow(
                &["s3:PutObject", "s3:PutObjectAcl", "s3:DeleteObject"],
                self.deploy_buckets.clone(),
            ));
        }
        let policy = manifest.add(
            self.scope.id("pipeline-policy"),
            &Policy {
                policy_name: self.scope.name("pipeline"),
                policy_document: PolicyDocument::new(statements),
                roles: vec![Expr::reference(&self.role)],
            },
        )?;

        let stage_count = self.stages.len();
        let pipeline = manifest.add_with_dependencies(
            self.scope.id("pipeline"),
            &Pipeline {
                name: self.name.clone(),
                role_arn: Expr::get_att(&self.role, "Arn"),
                artifact_store: ArtifactStore::s3(Expr::reference(&self.artifact_bucket)),
                stages: self.stages,
            },
            vec![policy],
        )?;

        manifest.add(
            self.scope.id("pipeline-webhook"),
            &Webhook::github_push(Expr::reference(&pipeline), SOURCE_STAGE, &self.source),
        )?;

        info!(
            pipeline = %self.name,
            source = %self.source.display_name(),
            stages = stage_count,
            "Built pipeline"
        );
        Ok(pipeline)
    }
}

fn bucket_objects(bucket: &LogicalId) -> Expr {
    Expr::join("", vec![Expr::get_att(bucket, "Arn"), "/*".into()])
}
