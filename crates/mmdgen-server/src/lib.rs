//! HTTP server for mmdgen.
//!
//! Serves a content directory as static files and intercepts diagram
//! requests (`.png`, `.svg`, `.pdf`) under a mount prefix, rendering the
//! artifact from its `.mmd` or `.md` source first when it is missing or stale.
//!
//! # Quick Start
//!
//! ```ignore
//! use mmdgen_config::Config;
//! use mmdgen_server::{run_server, server_config_from_config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load(None, None).unwrap();
//!     run_server(server_config_from_config(&config).unwrap()).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (prefix nest or fallback)
//!                        │
//!                        ├─► dispatch: decode path, GET/HEAD only
//!                        │       │
//!                        │       └─► Generator::resolve ──► mmdc
//!                        │
//!                        └─► ServeDir (ranges, conditional requests, MIME)
//! ```

mod app;
mod dispatch;
mod error;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use mmdgen_config::{Config, ConfigError};
use mmdgen_render::{Generator, GeneratorConfig, Renderer};

pub use app::create_router;
pub use error::ServerError;
pub use state::AppState;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Mount prefix, starting and ending with `/`.
    pub prefix: String,
    /// Content root and rendering policies.
    pub generator: GeneratorConfig,
    /// External renderer.
    pub renderer: Renderer,
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let generator = Generator::new(config.generator, config.renderer);
    let state = Arc::new(AppState::new(generator));
    let app = create_router(state, &config.prefix);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, prefix = %config.prefix, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from a loaded [`Config`].
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] if the renderer command is empty.
pub fn server_config_from_config(config: &Config) -> Result<ServerConfig, ConfigError> {
    Ok(ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        prefix: config.server.prefix.clone(),
        generator: GeneratorConfig::from_config(config),
        renderer: Renderer::from_config(&config.renderer)?,
    })
}
