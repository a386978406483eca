//! The public hosted zone shared by every service of a region.

use std::sync::Arc;

use stagecraft_config::{CertificateSource, MxRecord};
use stagecraft_core::dns::{
    AliasTarget, Certificate, DomainValidationOption, HostedZone, RecordSet, qualify_record_name,
};
use stagecraft_core::{Error, Expr, LogicalId, Manifest, Result, Scope};
use tracing::{debug, info};

/// A hosted zone plus the certificates bound to it.
///
/// Built once per region. Services add records to it, they never modify it.
#[derive(Debug, PartialEq, Eq)]
pub struct SharedZone {
    pub hosted_zone: LogicalId,
    pub zone_name: String,
    /// Certificate issued in this region, if any.
    pub certificate: Option<LogicalId>,
    /// ARNs the HTTPS listener and the CDN distributions are bound to.
    pub certificate_arns: Vec<Expr>,
    pub mx_record: Option<LogicalId>,
}

impl SharedZone {
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        zone_name: &str,
        certificate: &CertificateSource,
        mx_records: &[MxRecord],
    ) -> Result<Arc<Self>> {
        let hosted_zone = manifest.add(
            scope.id("hosted-zone"),
            &HostedZone {
                name: zone_name.to_string(),
            },
        )?;

        let (certificate, certificate_arns) = match certificate {
            CertificateSource::Existing { arns } => {
                (None, arns.iter().map(|arn| Expr::from(arn.as_str())).collect())
            }
            CertificateSource::Issued {
                domain_name,
                alternative_names,
            } => {
                let validation = std::iter::once(domain_name)
                    .chain(alternative_names)
                    .map(|name| DomainValidationOption {
                        domain_name: name.clone(),
                        hosted_zone_id: Expr::reference(&hosted_zone),
                    })
                    .collect();
                let id = manifest.add(
                    scope.id("certificate"),
                    &Certificate {
                        domain_name: domain_name.clone(),
                        subject_alternative_names: alternative_names.clone(),
                        validation_method: "DNS".to_string(),
                        domain_validation_options: validation,
                    },
                )?;
                let arn = Expr::reference(&id);
                (Some(id), vec![arn])
            }
        };

        // Absent and empty MX configuration both mean no record.
        let mx_record = if mx_records.is_empty() {
            None
        } else {
            let values = mx_records
                .iter()
                .map(|mx| format!("{} {}", mx.priority, mx.host_name))
                .collect();
            let id = manifest.add(
                scope.id("mx-records"),
                &RecordSet::mx(
                    Expr::reference(&hosted_zone),
                    qualify_record_name(zone_name, zone_name),
                    values,
                ),
            )?;
            debug!(count = mx_records.len(), "Added MX records");
            Some(id)
        };

        info!(zone = %zone_name, issued_certificate = certificate.is_some(), "Built hosted zone");

        Ok(Arc::new(Self {
            hosted_zone,
            zone_name: zone_name.to_string(),
            certificate,
            certificate_arns,
            mx_record,
        }))
    }

    pub fn hosted_zone_id(&self) -> Expr {
        Expr::reference(&self.hosted_zone)
    }

    /// Certificate the CDN distributions serve.
    pub fn primary_certificate(&self) -> Result<Expr> {
        self.certificate_arns.first().cloned().ok_or_else(|| {
            Error::InvalidInput(format!("zone '{}' has no certificate", self.zone_name))
        })
    }

    /// Fully qualified record name for `host` in this zone.
    pub fn record_name(&self, host: &str) -> String {
        qualify_record_name(host, &self.zone_name)
    }

    /// Add an `A` alias record for `host`.
    pub fn add_alias(
        &self,
        manifest: &mut Manifest,
        id: LogicalId,
        host: &str,
        target: AliasTarget,
    ) -> Result<LogicalId> {
        manifest.add(
            id,
            &RecordSet::alias(self.hosted_zone_id(), self.record_name(host), target),
        )
    }

    /// Add a CNAME record `record_name` → `domain_name`.
    pub fn add_cname(
        &self,
        manifest: &mut Manifest,
        id: LogicalId,
        record_name: &str,
        domain_name: &str,
    ) -> Result<LogicalId> {
        manifest.add(
            id,
            &RecordSet::cname(
                self.hosted_zone_id(),
                self.record_name(record_name),
                domain_name,
            ),
        )
    }
}
