//! Deployment topology composition for stagecraft.
//!
//! Turns a region configuration into a manifest:
//! - One network, load balancer and hosted zone per region
//! - A two-stage fleet service or a static site per declared service
//! - One build pipeline per service

pub mod dns;
pub mod edge;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod region;
pub mod service;
pub mod static_site;
pub mod target;

pub use dns::SharedZone;
pub use edge::SharedEdge;
pub use error::{TopologyError, TopologyResult};
pub use network::Network;
pub use pipeline::BuildPipeline;
pub use region::{
    RegionStack, RegionTopology, ServiceSummary, ServiceTopology, SynthOptions, synthesize,
};
pub use service::StagedService;
pub use static_site::{PublishedBucket, StaticSite};
pub use target::DeploymentTarget;
