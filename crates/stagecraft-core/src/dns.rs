//! DNS and certificate resources.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

/// Hosted zone id shared by every CloudFront distribution.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    pub name: String,
}

impl ResourceType for HostedZone {
    const TYPE: &'static str = "AWS::Route53::HostedZone";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub hosted_zone_id: Expr,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_target: Option<AliasTarget>,
}

impl ResourceType for RecordSet {
    const TYPE: &'static str = "AWS::Route53::RecordSet";
}

impl RecordSet {
    /// An `A` alias record.
    pub fn alias(zone: Expr, name: String, target: AliasTarget) -> Self {
        Self {
            hosted_zone_id: zone,
            name,
            record_type: "A".to_string(),
            ttl: None,
            resource_records: Vec::new(),
            alias_target: Some(target),
        }
    }

    pub fn cname(zone: Expr, name: String, domain_name: &str) -> Self {
        Self {
            hosted_zone_id: zone,
            name,
            record_type: "CNAME".to_string(),
            ttl: Some("1800".to_string()),
            resource_records: vec![domain_name.to_string()],
            alias_target: None,
        }
    }

    pub fn mx(zone: Expr, name: String, values: Vec<String>) -> Self {
        Self {
            hosted_zone_id: zone,
            name,
            record_type: "MX".to_string(),
            ttl: Some("1800".to_string()),
            resource_records: values,
            alias_target: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Expr,
    pub hosted_zone_id: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl ResourceType for Certificate {
    const TYPE: &'static str = "AWS::CertificateManager::Certificate";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: Expr,
}

/// Fully qualify a record name relative to a zone.
///
/// Names ending in `.` are already absolute. Names equal to or ending in the
/// zone name get a trailing dot. Anything else is treated as a label inside
/// the zone.
pub fn qualify_record_name(record_name: &str, zone_name: &str) -> String {
    let zone = zone_name.trim_end_matches('.');
    if record_name.ends_with('.') {
        record_name.to_string()
    } else if record_name == zone || record_name.ends_with(&format!(".{}", zone)) {
        format!("{}.", record_name)
    } else {
        format!("{}.{}.", record_name, zone)
    }
}
