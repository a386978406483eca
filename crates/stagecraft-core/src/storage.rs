//! Object storage resources.

use serde::Serialize;

use crate::Expr;
use crate::iam::{PolicyDocument, Principal, Statement};
use crate::manifest::ResourceType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
}

impl ResourceType for Bucket {
    const TYPE: &'static str = "AWS::S3::Bucket";
}

impl Bucket {
    /// A privately owned bucket with a provider-generated name.
    pub fn private() -> Self {
        Self {
            bucket_name: None,
            access_control: None,
            website_configuration: None,
        }
    }

    /// A named bucket whose objects anyone can read.
    pub fn public_read(name: impl Into<String>) -> Self {
        Self {
            bucket_name: Some(name.into()),
            access_control: Some("PublicRead".to_string()),
            website_configuration: Some(WebsiteConfiguration {
                index_document: "index.html".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    pub index_document: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    pub bucket: Expr,
    pub policy_document: PolicyDocument,
}

impl ResourceType for BucketPolicy {
    const TYPE: &'static str = "AWS::S3::BucketPolicy";
}

impl BucketPolicy {
    /// Grant `s3:GetObject` on every object to anyone.
    pub fn public_read(bucket: Expr, bucket_arn: Expr) -> Self {
        Self {
            bucket,
            policy_document: PolicyDocument::new(vec![
                Statement::allow(&["s3:GetObject"], vec![Expr::join("", vec![bucket_arn, "/*".into()])])
                    .with_principal(Principal::anyone()),
            ]),
        }
    }
}

/// Whether `name` is usable as a bucket name: 3 to 63 characters of
/// lowercase letters, digits, `.` and `-`, starting and ending with a letter
/// or digit.
pub fn is_valid_bucket_name(name: &str) -> bool {
    let len_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    let edges_ok = name
        .chars()
        .next()
        .zip(name.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);
    len_ok && chars_ok && edges_ok && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        assert!(is_valid_bucket_name("acme-web-staging-static-assets"));
        assert!(!is_valid_bucket_name("Acme-Web"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("-leading"));
        assert!(!is_valid_bucket_name("double..dot"));
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
    }

    #[test]
    fn test_public_read_policy() {
        let policy = BucketPolicy::public_read(Expr::from("b"), Expr::from("arn"));
        let value = serde_json::to_value(&policy).unwrap();
        let statement = &value["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Principal"], "*");
        assert_eq!(statement["Action"][0], "s3:GetObject");
    }
}
