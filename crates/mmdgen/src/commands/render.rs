//! `mmdgen render` command implementation.

use clap::Args;
use mmdgen_config::CliSettings;
use mmdgen_render::{Generator, GeneratorConfig, Renderer, Resolution};

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Artifact path relative to the content root, e.g. `docs/flow.300x200.svg`.
    path: String,

    #[command(flatten)]
    pub(crate) config: ConfigArgs,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the path is not a diagram
    /// with a source, or rendering fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.config.load(CliSettings::default())?;
        let generator = Generator::new(
            GeneratorConfig::from_config(&config),
            Renderer::from_config(&config.renderer)?,
        );

        match generator.resolve(&self.path).await? {
            Resolution::Rendered(artifact) => {
                output.success(&format!("Rendered {}", artifact.display()));
            }
            Resolution::Fresh(artifact) => {
                output.info(&format!("Up to date: {}", artifact.display()));
            }
            Resolution::Static(artifact) => {
                output.warning(&format!(
                    "No source for {}, existing file left as-is",
                    artifact.display()
                ));
            }
            Resolution::Missing => {
                return Err(CliError::Validation(format!(
                    "No .md or .mmd source found for {}",
                    self.path
                )));
            }
            Resolution::Passthrough => {
                return Err(CliError::Validation(format!(
                    "Not a diagram path (expected .png, .svg or .pdf): {}",
                    self.path
                )));
            }
        }

        Ok(())
    }
}
