//! Creation plan command.

use std::path::Path;

use anyhow::{Context, Result};

use super::load_topology;

/// Print resources grouped into waves that can be created in parallel.
pub fn run(config: &Path) -> Result<()> {
    let topology = load_topology(config, true)?;
    let manifest = &topology.manifest;
    let waves = manifest
        .creation_waves()
        .context("Failed to order resources")?;

    for (index, wave) in waves.iter().enumerate() {
        println!("Wave {} ({} resources)", index + 1, wave.len());
        for id in wave {
            let type_name = manifest
                .get(id)
                .map(|r| r.type_name.as_str())
                .unwrap_or("?");
            println!("  {}  {}", id, type_name);
        }
    }
    println!("{} resources in {} waves", manifest.len(), waves.len());
    Ok(())
}
