//! The VPC every fleet and the load balancer live in.

use stagecraft_core::network::{
    InternetGateway, Route, RouteTable, Subnet, SubnetRouteTableAssociation, Tag, Vpc,
    VpcGatewayAttachment,
};
use stagecraft_core::{Expr, LogicalId, Manifest, Result, Scope};
use tracing::info;

pub const VPC_CIDR: &str = "10.0.0.0/16";

/// Public subnets across `max_azs` availability zones behind one internet
/// gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub vpc: LogicalId,
    pub internet_gateway: LogicalId,
    pub public_subnets: Vec<LogicalId>,
}

impl Network {
    pub fn build(scope: &Scope, manifest: &mut Manifest, max_azs: u32) -> Result<Self> {
        let scope = scope.child("vpc");
        let vpc = manifest.add(
            scope.id("vpc"),
            &Vpc {
                cidr_block: VPC_CIDR.to_string(),
                enable_dns_hostnames: true,
                enable_dns_support: true,
                tags: vec![Tag::name(scope.prefix())],
            },
        )?;

        let internet_gateway = manifest.add(
            scope.id("igw"),
            &InternetGateway {
                tags: vec![Tag::name(scope.name("igw"))],
            },
        )?;
        let attachment = manifest.add(
            scope.id("vpc-gateway-attachment"),
            &VpcGatewayAttachment {
                vpc_id: Expr::reference(&vpc),
                internet_gateway_id: Expr::reference(&internet_gateway),
            },
        )?;

        let route_table = manifest.add(
            scope.id("public-route-table"),
            &RouteTable {
                vpc_id: Expr::reference(&vpc),
                tags: vec![Tag::name(scope.name("public"))],
            },
        )?;
        // The default route is only valid once the gateway is attached.
        manifest.add_with_dependencies(
            scope.id("public-default-route"),
            &Route {
                route_table_id: Expr::reference(&route_table),
                destination_cidr_block: "0.0.0.0/0".to_string(),
                gateway_id: Expr::reference(&internet_gateway),
            },
            vec![attachment],
        )?;

        let mut public_subnets = Vec::with_capacity(max_azs as usize);
        for index in 0..max_azs {
            let subnet_scope = scope.child(format!("public-subnet-{}", index + 1));
            let subnet = manifest.add(
                subnet_scope.id("subnet"),
                &Subnet {
                    vpc_id: Expr::reference(&vpc),
                    cidr_block: format!("10.0.{}.0/24", index),
                    availability_zone: Expr::availability_zone(index),
                    map_public_ip_on_launch: true,
                    tags: vec![Tag::name(subnet_scope.prefix())],
                },
            )?;
            manifest.add(
                subnet_scope.id("route-table-association"),
                &SubnetRouteTableAssociation {
                    route_table_id: Expr::reference(&route_table),
                    subnet_id: Expr::reference(&subnet),
                },
            )?;
            public_subnets.push(subnet);
        }

        info!(vpc = %vpc, subnets = public_subnets.len(), "Built network");

        Ok(Self {
            vpc,
            internet_gateway,
            public_subnets,
        })
    }

    pub fn vpc_id(&self) -> Expr {
        Expr::reference(&self.vpc)
    }

    pub fn public_subnet_ids(&self) -> Vec<Expr> {
        self.public_subnets.iter().map(Expr::reference).collect()
    }
}
