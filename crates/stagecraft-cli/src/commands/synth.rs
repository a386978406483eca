//! Template synthesis command.

use std::path::Path;

use anyhow::{Context, Result};
use stagecraft_core::synth::{Synthesizer, TemplateSynthesizer};
use tracing::info;

use super::load_topology;

/// Synthesize the template to `out`, or stdout.
pub fn run(config: &Path, out: Option<&Path>, compact: bool, validate: bool) -> Result<()> {
    let topology = load_topology(config, validate)?;
    let synthesizer = TemplateSynthesizer { compact };
    let rendered = synthesizer
        .synthesize(&topology.manifest)
        .context("Failed to render template")?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write template: {}", path.display()))?;
            info!(
                path = %path.display(),
                resources = topology.manifest.len(),
                synthesizer = synthesizer.name(),
                "Wrote template"
            );
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
