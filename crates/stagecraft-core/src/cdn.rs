//! CDN distribution resources.

use serde::Serialize;

use crate::Expr;
use crate::manifest::ResourceType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Distribution {
    pub distribution_config: DistributionConfig,
}

impl ResourceType for Distribution {
    const TYPE: &'static str = "AWS::CloudFront::Distribution";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    pub aliases: Vec<String>,
    pub enabled: bool,
    pub default_root_object: String,
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    pub price_class: String,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: CacheBehavior,
    pub viewer_certificate: ViewerCertificate,
}

impl DistributionConfig {
    /// A single bucket origin with one compressed default behaviour.
    pub fn for_bucket(alias: &str, bucket_domain: Expr, certificate_arn: Expr) -> Self {
        let origin_id = "origin1".to_string();
        Self {
            aliases: vec![alias.to_string()],
            enabled: true,
            default_root_object: "index.html".to_string(),
            http_version: "http2".to_string(),
            ipv6_enabled: true,
            price_class: "PriceClass_100".to_string(),
            origins: vec![Origin {
                id: origin_id.clone(),
                domain_name: bucket_domain,
                s3_origin_config: S3OriginConfig {},
            }],
            default_cache_behavior: CacheBehavior {
                target_origin_id: origin_id,
                viewer_protocol_policy: "redirect-to-https".to_string(),
                compress: true,
                allowed_methods: vec!["GET".to_string(), "HEAD".to_string()],
                cached_methods: vec!["GET".to_string(), "HEAD".to_string()],
                forwarded_values: ForwardedValues {
                    query_string: false,
                    cookies: Cookies {
                        forward: "none".to_string(),
                    },
                },
            },
            viewer_certificate: ViewerCertificate {
                acm_certificate_arn: certificate_arn,
                ssl_support_method: "sni-only".to_string(),
                minimum_protocol_version: "TLSv1.2_2021".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: Expr,
    pub s3_origin_config: S3OriginConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct S3OriginConfig {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub compress: bool,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub forwarded_values: ForwardedValues,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForwardedValues {
    pub query_string: bool,
    pub cookies: Cookies,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cookies {
    pub forward: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    #[serde(rename = "AcmCertificateArn")]
    pub acm_certificate_arn: Expr,
    #[serde(rename = "SslSupportMethod")]
    pub ssl_support_method: String,
    pub minimum_protocol_version: String,
}
