//! Router construction.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::dispatch;
use crate::middleware::headers;
use crate::state::AppState;

/// Create the application router with the dispatcher mounted at `prefix`.
///
/// A prefix of `/` makes the dispatcher the router fallback; any other prefix
/// is nested, and stripped from the path before dispatch. Paths outside the
/// prefix get `404`.
pub fn create_router(state: Arc<AppState>, prefix: &str) -> Router {
    let dispatcher = Router::new()
        .fallback(dispatch::dispatch)
        .with_state(state);

    let mount = prefix.trim_end_matches('/');
    let router = if mount.is_empty() {
        dispatcher
    } else {
        Router::new().nest_service(mount, dispatcher)
    };

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(headers::cache_control_layer()),
    )
}
