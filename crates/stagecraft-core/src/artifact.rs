//! Pipeline artifacts.

use serde::{Deserialize, Serialize};

use crate::Expr;

/// A named artifact passed between pipeline actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "Name")]
    pub name: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Where a pipeline keeps artifacts between stages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactStore {
    #[serde(rename = "Type")]
    pub kind: String,
    pub location: Expr,
}

impl ArtifactStore {
    pub fn s3(bucket: Expr) -> Self {
        Self {
            kind: "S3".to_string(),
            location: bucket,
        }
    }
}

/// Build output of a pipeline.
///
/// `service` is deployed to the fleet. `assets`, when present, is uploaded
/// to the static assets bucket of each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutputs {
    pub service: Artifact,
    pub assets: Option<Artifact>,
}

impl BuildOutputs {
    pub fn single(name: &str) -> Self {
        Self {
            service: Artifact::new(name),
            assets: None,
        }
    }

    pub fn with_assets(service: &str, assets: &str) -> Self {
        Self {
            service: Artifact::new(service),
            assets: Some(Artifact::new(assets)),
        }
    }

    pub fn all(&self) -> Vec<Artifact> {
        std::iter::once(self.service.clone())
            .chain(self.assets.clone())
            .collect()
    }
}
