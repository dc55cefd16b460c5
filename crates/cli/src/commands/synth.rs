//! `synth` command handler

use std::path::Path;

use anyhow::{Context, Result};
use cloudformation::CloudFormationSynthesizer;
use topology::{Stack, TemplateSynthesizer};
use tracing::info;

/// Synthesizes the template and writes it to `output`, or stdout.
pub fn handle_synth(
    stack: &Stack,
    output: Option<&Path>,
    compact: bool,
    description: Option<String>,
) -> Result<()> {
    let mut synthesizer = CloudFormationSynthesizer::new();
    if let Some(description) = description {
        synthesizer = synthesizer.with_description(description);
    }
    let template = synthesizer
        .synthesize(stack)
        .context("Failed to synthesize template")?;

    let json = if compact {
        template.to_json()?
    } else {
        template.to_json_pretty()?
    };

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write template to {}", path.display()))?;
            info!(path = %path.display(), "Wrote template");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use topology::StackSettings;

    use super::*;

    #[test]
    fn writes_the_template_with_the_given_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let stack = Stack::build(&StackSettings::default());

        handle_synth(&stack, Some(&path), true, Some("orders pipeline".to_string())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("}\n"));
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains(r#""Description":"orders pipeline""#));
    }
}
