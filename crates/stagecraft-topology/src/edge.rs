//! The internet-facing load balancer shared by every fleet of a region.

use std::sync::Arc;

use stagecraft_core::dns::AliasTarget;
use stagecraft_core::elb::{Listener, ListenerAction, ListenerCertificate, ListenerRule, LoadBalancer};
use stagecraft_core::network::{IngressRule, SecurityGroup};
use stagecraft_core::{Expr, LogicalId, Manifest, Result, Scope};
use tracing::info;

use crate::network::Network;

pub const HTTPS_PORT: u16 = 443;
pub const HTTP_PORT: u16 = 80;

/// Load balancer, its listeners and its security group.
///
/// Services attach host rules to the HTTPS listener and point alias
/// records at the load balancer; neither changes this value.
#[derive(Debug, PartialEq, Eq)]
pub struct SharedEdge {
    pub load_balancer: LogicalId,
    pub https_listener: LogicalId,
    pub http_listener: LogicalId,
    pub security_group: LogicalId,
}

impl SharedEdge {
    pub fn build(
        scope: &Scope,
        manifest: &mut Manifest,
        network: &Network,
        certificate_arns: &[Expr],
    ) -> Result<Arc<Self>> {
        let security_group = manifest.add(
            scope.id("loadbalancer-security-group"),
            &SecurityGroup {
                group_description: format!("{} load balancer", scope.prefix()),
                vpc_id: network.vpc_id(),
                security_group_ingress: vec![
                    IngressRule::tcp_from_anywhere(HTTPS_PORT, "Open to the world"),
                    IngressRule::tcp_from_anywhere(HTTP_PORT, "Redirect to HTTPS"),
                ],
            },
        )?;

        let load_balancer = manifest.add(
            scope.id("loadbalancer"),
            &LoadBalancer {
                kind: "application".to_string(),
                scheme: "internet-facing".to_string(),
                subnets: network.public_subnet_ids(),
                security_groups: vec![Expr::get_att(&security_group, "GroupId")],
            },
        )?;

        let https_listener = manifest.add(
            scope.id("https-listener"),
            &Listener {
                load_balancer_arn: Expr::reference(&load_balancer),
                port: HTTPS_PORT,
                protocol: "HTTPS".to_string(),
                certificates: certificate_arns
                    .iter()
                    .map(|arn| ListenerCertificate {
                        certificate_arn: arn.clone(),
                    })
                    .collect(),
                default_actions: vec![ListenerAction::fixed_response("404")],
            },
        )?;

        let http_listener = manifest.add(
            scope.id("http-listener"),
            &Listener {
                load_balancer_arn: Expr::reference(&load_balancer),
                port: HTTP_PORT,
                protocol: "HTTP".to_string(),
                certificates: Vec::new(),
                default_actions: vec![ListenerAction::redirect_to_https()],
            },
        )?;

        info!(load_balancer = %load_balancer, certificates = certificate_arns.len(), "Built network edge");

        Ok(Arc::new(Self {
            load_balancer,
            https_listener,
            http_listener,
            security_group,
        }))
    }

    pub fn dns_name(&self) -> Expr {
        Expr::get_att(&self.load_balancer, "DNSName")
    }

    pub fn security_group_id(&self) -> Expr {
        Expr::get_att(&self.security_group, "GroupId")
    }

    /// Alias target for records that resolve to the load balancer.
    pub fn alias_target(&self) -> AliasTarget {
        AliasTarget {
            dns_name: self.dns_name(),
            hosted_zone_id: Expr::get_att(&self.load_balancer, "CanonicalHostedZoneID"),
        }
    }

    /// Add a rule forwarding requests for `host` to `target_group`.
    pub fn add_host_rule(
        &self,
        manifest: &mut Manifest,
        id: LogicalId,
        host: &str,
        priority: u32,
        target_group: Expr,
    ) -> Result<LogicalId> {
        manifest.add(
            id,
            &ListenerRule::forward_host(
                Expr::reference(&self.https_listener),
                host,
                priority,
                target_group,
            ),
        )
    }
}
