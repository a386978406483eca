//! Manifest synthesizers.
//!
//! A synthesizer renders a finished manifest for a consumer: the
//! provisioning engine (template JSON) or a person (summary).

use std::fmt::Write as _;

use crate::manifest::Manifest;
use crate::Result;

/// Trait for manifest renderers.
pub trait Synthesizer {
    /// Name of this synthesizer.
    fn name(&self) -> &'static str;

    /// Render the manifest.
    fn synthesize(&self, manifest: &Manifest) -> Result<String>;
}

/// Renders the provisioning template as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSynthesizer {
    pub compact: bool,
}

impl Synthesizer for TemplateSynthesizer {
    fn name(&self) -> &'static str {
        "template"
    }

    fn synthesize(&self, manifest: &Manifest) -> Result<String> {
        let template = manifest.to_template()?;
        let rendered = if self.compact {
            serde_json::to_string(&template)?
        } else {
            serde_json::to_string_pretty(&template)?
        };
        Ok(rendered)
    }
}

/// One line per resource: logical id and type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarySynthesizer;

impl Synthesizer for SummarySynthesizer {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn synthesize(&self, manifest: &Manifest) -> Result<String> {
        let width = manifest
            .resources()
            .iter()
            .map(|r| r.id.as_str().len())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for resource in manifest.resources() {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{:<width$}  {}", resource.id.as_str(), resource.type_name);
        }
        let _ = writeln!(out, "{} resources", manifest.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogicalId;
    use crate::storage::Bucket;

    fn manifest() -> Manifest {
        let mut manifest = Manifest::new("synth test");
        manifest
            .add(LogicalId::named("Assets").unwrap(), &Bucket::private())
            .unwrap();
        manifest
    }

    #[test]
    fn test_template_synthesizer_round_trips_json() {
        let rendered = TemplateSynthesizer { compact: true }
            .synthesize(&manifest())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["Resources"]["Assets"]["Type"], "AWS::S3::Bucket");
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn test_summary_lists_resources() {
        let rendered = SummarySynthesizer.synthesize(&manifest()).unwrap();
        assert!(rendered.contains("Assets  AWS::S3::Bucket"));
        assert!(rendered.ends_with("1 resources\n"));
    }
}
