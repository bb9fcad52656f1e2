//! mmdgen CLI - on-demand diagram rendering.
//!
//! Provides commands for:
//! - `serve`: Serve a content directory, rendering diagrams on request
//! - `render`: Render a single artifact path and exit

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{RenderArgs, ServeArgs};
use output::Output;

/// mmdgen - lazy diagram rendering with an mtime-validated disk cache.
#[derive(Parser)]
#[command(name = "mmdgen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the diagram server.
    Serve(ServeArgs),
    /// Render one artifact path if it is missing or stale.
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Serve(args) => args.config.verbose,
        Commands::Render(args) => args.config.verbose,
    };

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = tokio::runtime::Runtime::new()
        .map_err(error::CliError::from)
        .and_then(|rt| {
            rt.block_on(async {
                match cli.command {
                    Commands::Serve(args) => args.execute().await,
                    Commands::Render(args) => args.execute().await,
                }
            })
        });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
