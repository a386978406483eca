//! Region-wide collision checks.
//!
//! Listener priorities and host names share one load balancer and one
//! zone across every service, and bucket names share one global namespace.
//! None of these collisions is caught while composing resources; this pass
//! rejects them before anything is built.

use std::collections::{BTreeSet, HashMap};

use stagecraft_core::dns::qualify_record_name;
use stagecraft_core::storage::is_valid_bucket_name;
use tracing::debug;

use crate::region::{RegionConfig, StageConfig, StageName};
use crate::{ConfigError, ConfigResult};

/// Who claimed a priority, host or bucket first.
fn owner(service: &str, stage: StageName) -> String {
    format!("{}/{}", service, stage)
}

/// Every name a stage answers on or creates a record for, normalized.
///
/// A CNAME record name is qualified against the zone, not the stage host,
/// so it can differ from the host its listener rule matches.
fn record_names(config: &RegionConfig, stage: &StageConfig) -> BTreeSet<String> {
    let cname_records = stage
        .cname
        .iter()
        .map(|c| qualify_record_name(&c.record_name, &config.zone_name));
    stage
        .host_names()
        .into_iter()
        .chain(cname_records)
        .map(|host| host.trim_end_matches('.').to_lowercase())
        .collect()
}

/// Reject duplicate listener priorities, duplicate host names and
/// duplicate or invalid bucket names across the region.
pub fn validate_topology(config: &RegionConfig) -> ConfigResult<()> {
    let mut priorities: HashMap<u32, String> = HashMap::new();
    let mut hosts: HashMap<String, String> = HashMap::new();
    let mut buckets: HashMap<String, String> = HashMap::new();

    for service in &config.services {
        for (stage, stage_config) in service.stages.iter() {
            let claimant = owner(&service.name, stage);

            if service.kind.has_fleet() {
                let mut claimed = vec![stage_config.priority];
                claimed.extend(stage_config.cname.as_ref().map(|c| c.priority));
                for priority in claimed {
                    if let Some(first) = priorities.insert(priority, claimant.clone()) {
                        return Err(ConfigError::Duplicate(format!(
                            "listener priority {} used by {} and {}",
                            priority, first, claimant
                        )));
                    }
                }
            }

            for host in record_names(config, stage_config) {
                if let Some(first) = hosts.insert(host.clone(), claimant.clone()) {
                    return Err(ConfigError::Duplicate(format!(
                        "host name {} used by {} and {}",
                        host, first, claimant
                    )));
                }
            }

            if let Some(bucket) = config.bucket_name(service, stage) {
                if !is_valid_bucket_name(&bucket) {
                    return Err(ConfigError::invalid(
                        "bucket name",
                        format!("{} (derived for {}) is not a valid bucket name", bucket, claimant),
                    ));
                }
                if let Some(first) = buckets.insert(bucket.clone(), claimant.clone()) {
                    return Err(ConfigError::Duplicate(format!(
                        "bucket {} used by {} and {}",
                        bucket, first, claimant
                    )));
                }
            }
        }
    }

    debug!(
        services = config.services.len(),
        priorities = priorities.len(),
        hosts = hosts.len(),
        buckets = buckets.len(),
        "topology validated"
    );
    Ok(())
}
