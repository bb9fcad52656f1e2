//! Application state.

use std::sync::Arc;

use mmdgen_render::Generator;
use tower_http::services::ServeDir;

/// State shared by all requests.
pub struct AppState {
    /// Render pipeline, shared with spawned render tasks.
    pub(crate) generator: Arc<Generator>,
    /// Static responder over the content root.
    pub(crate) files: ServeDir,
}

impl AppState {
    /// Create state serving `generator`'s content root.
    #[must_use]
    pub fn new(generator: Generator) -> Self {
        let files = ServeDir::new(&generator.config().root);
        Self {
            generator: Arc::new(generator),
            files,
        }
    }
}
