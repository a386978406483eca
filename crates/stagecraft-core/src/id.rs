//! Resource identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A logical identifier for a resource, parameter or output in a manifest.
///
/// Identifiers derived from a construct path are deterministic: the same
/// path always yields the same id, so synthesizing a configuration twice
/// produces the same manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Create a LogicalId from a literal name. Only ASCII alphanumerics are allowed.
    pub fn named(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "logical id must be non-empty and alphanumeric: '{}'",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Derive a LogicalId from a construct path.
    ///
    /// Segments are PascalCased and concatenated, then suffixed with the
    /// first eight hex digits of the MD5 of the `/`-joined path.
    pub fn from_path<S: AsRef<str>>(path: &[S]) -> Self {
        let human: String = path.iter().map(|s| pascal_case(s.as_ref())).collect();
        let joined = path
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("/");
        let digest = format!("{:X}", md5::compute(joined.as_bytes()));
        Self(format!("{}{}", human, &digest[..8]))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A position in the construct tree.
///
/// Scopes produce both logical ids (for the manifest) and physical names
/// (for resources whose name is visible to the provider, e.g. pipelines
/// and buckets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    path: Vec<String>,
}

impl Scope {
    /// Create a root scope.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
        }
    }

    /// Create a nested scope.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(name.into());
        Self { path }
    }

    /// Logical id for a resource directly under this scope.
    pub fn id(&self, leaf: &str) -> LogicalId {
        let mut path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        path.push(leaf);
        LogicalId::from_path(&path)
    }

    /// Physical name for a resource directly under this scope.
    pub fn name(&self, leaf: &str) -> String {
        format!("{}-{}", self.prefix(), leaf)
    }

    /// The scope path joined with `-`.
    pub fn prefix(&self) -> String {
        self.path.join("-")
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

fn pascal_case(segment: &str) -> String {
    segment
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_is_deterministic() {
        let a = LogicalId::from_path(&["acme-web", "staging", "target-group"]);
        let b = LogicalId::from_path(&["acme-web", "staging", "target-group"]);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("AcmeWebStagingTargetGroup"));
        assert_eq!(a.as_str().len(), "AcmeWebStagingTargetGroup".len() + 8);
    }

    #[test]
    fn test_hash_suffix_separates_similar_paths() {
        // Both flatten to the same PascalCase prefix.
        let a = LogicalId::from_path(&["web-service", "staging"]);
        let b = LogicalId::from_path(&["web", "service-staging"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_path_is_alphanumeric() {
        let id = LogicalId::from_path(&["acme.example.com", "www_record"]);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_named_rejects_punctuation() {
        assert!(LogicalId::named("LatestAmiId").is_ok());
        assert!(LogicalId::named("latest-ami").is_err());
        assert!(LogicalId::named("").is_err());
    }

    #[test]
    fn test_scope_names() {
        let scope = Scope::root("acme").child("web");
        assert_eq!(scope.name("pipeline"), "acme-web-pipeline");
        assert_eq!(scope.child("staging").prefix(), "acme-web-staging");
        assert_eq!(scope.id("pipeline"), LogicalId::from_path(&["acme", "web", "pipeline"]));
    }
}
