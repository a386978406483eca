//! Core manifest model for stagecraft.
//!
//! This crate contains:
//! - Logical identifiers and construct scopes
//! - Intrinsic expressions
//! - The resource manifest, its dependency graph and digest
//! - Typed resource properties (network, load balancing, DNS, compute,
//!   IAM, storage, CDN, pipelines, deployments)
//! - Synthesizers that render a manifest

pub mod artifact;
pub mod canonical;
pub mod cdn;
pub mod compute;
pub mod deployer;
pub mod dns;
pub mod elb;
pub mod error;
pub mod expr;
pub mod iam;
pub mod id;
pub mod manifest;
pub mod network;
pub mod pipeline;
pub mod repository;
pub mod secret;
pub mod storage;
pub mod synth;

pub use error::{Error, Result};
pub use expr::Expr;
pub use id::{LogicalId, Scope};
pub use manifest::{Manifest, Resource, ResourceType};
