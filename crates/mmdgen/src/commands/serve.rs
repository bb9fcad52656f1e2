//! `mmdgen serve` command implementation.

use clap::Args;
use mmdgen_config::CliSettings;
use mmdgen_server::{run_server, server_config_from_config};

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// URL mount prefix, starting and ending with `/` (overrides config).
    #[arg(long)]
    prefix: Option<String>,

    #[command(flatten)]
    pub(crate) config: ConfigArgs,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.config.load(CliSettings {
            host: self.host,
            port: self.port,
            prefix: self.prefix,
            ..CliSettings::default()
        })?;

        let root = &config.content_resolved.root;
        if !root.is_dir() {
            return Err(CliError::Validation(format!(
                "Content root is not a directory: {}",
                root.display()
            )));
        }

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.field("Prefix", &config.server.prefix);
        output.field("Content root", &root.display().to_string());
        output.field("Renderer", &config.renderer.command);
        output.field(
            "Default size",
            &format!("{}x{}", config.renderer.width, config.renderer.height),
        );
        output.field(
            "Staleness",
            &config.content_resolved.staleness.to_string(),
        );
        if let Some(path) = &config.config_path {
            output.field("Config", &path.display().to_string());
        }

        let server_config = server_config_from_config(&config)?;
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}
