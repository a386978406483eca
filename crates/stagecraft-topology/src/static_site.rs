//! Static sites: a public bucket and a CDN distribution per stage.

use std::sync::Arc;

use stagecraft_config::{RegionConfig, ServiceConfig, StageName};
use stagecraft_core::artifact::{Artifact, BuildOutputs};
use stagecraft_core::cdn::{Distribution, DistributionConfig};
use stagecraft_core::dns::{AliasTarget, CLOUDFRONT_HOSTED_ZONE_ID};
use stagecraft_core::pipeline::Action;
use stagecraft_core::storage::{Bucket, BucketPolicy};
use stagecraft_core::{Error, Expr, LogicalId, Manifest, Result, Scope};
use tracing::info;

use crate::dns::SharedZone;
use crate::pipeline::BuildPipeline;

/// Build artifact holding the site content.
pub const STATIC_ARTIFACT: &str = "static";

/// A public-read bucket served through a CDN distribution under `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedBucket {
    pub host: String,
    pub bucket_name: String,
    pub bucket: LogicalId,
    pub distribution: LogicalId,
    pub record: LogicalId,
}

impl PublishedBucket {
    /// Add the bucket, its public-read policy, the distribution and an
    /// alias record for `host` pointing at the distribution.
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        zone: &SharedZone,
        bucket_name: &str,
        host: &str,
    ) -> Result<Self> {
        let bucket = manifest.add(scope.id("bucket"), &Bucket::public_read(bucket_name))?;
        manifest.add(
            scope.id("bucket-policy"),
            &BucketPolicy::public_read(
                Expr::reference(&bucket),
                Expr::get_att(&bucket, "Arn"),
            ),
        )?;

        let distribution = manifest.add(
            scope.id("distribution"),
            &Distribution {
                distribution_config: DistributionConfig::for_bucket(
                    host,
                    Expr::get_att(&bucket, "RegionalDomainName"),
                    zone.primary_certificate()?,
                ),
            },
        )?;

        let record = zone.add_alias(
            manifest,
            scope.id("alias-record"),
            host,
            AliasTarget {
                dns_name: Expr::get_att(&distribution, "DomainName"),
                hosted_zone_id: Expr::from(CLOUDFRONT_HOSTED_ZONE_ID),
            },
        )?;

        Ok(Self {
            host: host.to_string(),
            bucket_name: bucket_name.to_string(),
            bucket,
            distribution,
            record,
        })
    }

    /// Pipeline action extracting the build output into the bucket.
    pub fn deploy_action(&self, name: &str) -> Action {
        Action::s3_deploy(
            name,
            &Expr::reference(&self.bucket),
            Artifact::new(STATIC_ARTIFACT),
        )
    }
}

/// A service published as static content, no fleet.
#[derive(Debug)]
pub struct StaticSite {
    pub name: String,
    pub zone: Arc<SharedZone>,
    pub pipeline: LogicalId,
    pub stages: Vec<(StageName, PublishedBucket)>,
}

impl StaticSite {
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        zone: Arc<SharedZone>,
        region: &RegionConfig,
        service: &ServiceConfig,
    ) -> Result<Self> {
        let mut pipeline = BuildPipeline::new(
            scope,
            manifest,
            service.source.to_repository(),
            service.build_spec(),
            BuildOutputs::single(STATIC_ARTIFACT),
        )?;

        let mut stages = Vec::with_capacity(2);
        for (stage, stage_config) in service.stages.iter() {
            let stage_scope = scope.child(stage.as_str());
            let bucket_name = region.bucket_name(service, stage).ok_or_else(|| {
                Error::InvalidInput(format!("service '{}' has no site bucket", service.name))
            })?;
            let site = PublishedBucket::build(
                &stage_scope,
                manifest,
                &zone,
                &bucket_name,
                &stage_config.host_name,
            )?;
            pipeline.grant_bucket_write(&site.bucket);
            pipeline.add_stage(
                stage_config.host_name.clone(),
                vec![site.deploy_action(&stage_scope.name("s3"))],
            );
            stages.push((stage, site));
        }

        let pipeline = pipeline.finish(manifest)?;
        info!(service = %service.name, "Built static site");

        Ok(Self {
            name: service.name.clone(),
            zone,
            pipeline,
            stages,
        })
    }
}
