//! Source repository coordinates.

use serde::{Deserialize, Serialize};

use crate::secret::SecretRef;

/// Git provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Github,
}

impl std::fmt::Display for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitProvider::Github => write!(f, "github"),
        }
    }
}

impl std::str::FromStr for GitProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(GitProvider::Github),
            _ => Err(format!("Unknown git provider: {}", s)),
        }
    }
}

/// A branch of a hosted repository, checked out by webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepository {
    pub provider: GitProvider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// OAuth token used to read the repository and register the webhook.
    pub token: SecretRef,
}

impl SourceRepository {
    /// `owner/repo@branch`
    pub fn display_name(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.branch)
    }

    /// Git ref a push webhook must match.
    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}
