//! Secret references.
//!
//! Secrets are never read at synthesis time. The manifest carries a dynamic
//! reference that the provisioning engine resolves when it applies.

use serde::{Deserialize, Serialize};

/// A field of a JSON secret held in the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Secret ARN or name.
    pub arn: String,
    /// JSON field holding the value.
    pub json_field: String,
}

impl SecretRef {
    pub fn new(arn: impl Into<String>, json_field: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            json_field: json_field.into(),
        }
    }

    /// Dynamic reference resolved by the provisioning engine.
    pub fn dynamic_reference(&self) -> String {
        format!(
            "{{{{resolve:secretsmanager:{}:SecretString:{}}}}}",
            self.arn, self.json_field
        )
    }
}
