//! CLI command implementations.

pub mod plan;
pub mod synth;

use std::path::Path;

use anyhow::{Context, Result};
use stagecraft_core::synth::{SummarySynthesizer, Synthesizer};
use stagecraft_topology::{RegionTopology, SynthOptions};

/// Load a configuration file and compose its region.
pub fn load_topology(path: &Path, validate: bool) -> Result<RegionTopology> {
    let config = stagecraft_config::load(path)
        .with_context(|| format!("Failed to load configuration: {}", path.display()))?;
    let topology = stagecraft_topology::synthesize(&config, SynthOptions { validate })
        .with_context(|| format!("Failed to compose stack '{}'", config.stack_name))?;
    Ok(topology)
}

pub fn validate(path: &Path) -> Result<()> {
    let topology = load_topology(path, true)?;
    let digest = topology
        .manifest
        .digest()
        .context("Failed to compute template digest")?;

    println!("Configuration is valid");
    for summary in topology.summaries() {
        println!(
            "  {} ({}) -> {}",
            summary.name,
            summary.kind,
            summary.hosts.join(", ")
        );
    }
    println!("Resources: {}", topology.manifest.len());
    println!("Digest: {}", digest);
    Ok(())
}

pub fn list(path: &Path) -> Result<()> {
    let topology = load_topology(path, true)?;
    let rendered = SummarySynthesizer
        .synthesize(&topology.manifest)
        .context("Failed to render resource summary")?;
    print!("{}", rendered);
    Ok(())
}
