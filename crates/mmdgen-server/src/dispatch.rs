//! Request dispatcher.
//!
//! Every request under the mount prefix lands here. GET and HEAD requests are
//! resolved through the [`Generator`](mmdgen_render::Generator) first; whatever
//! file is on disk afterwards is served by the static responder.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use mmdgen_render::Resolution;
use percent_encoding::percent_decode_str;
use tower::ServiceExt;

use crate::error::ServerError;
use crate::state::AppState;

/// Fallback handler for the mount prefix.
pub(crate) async fn dispatch(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match handle(&state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle(state: &AppState, req: Request) -> Result<Response, ServerError> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(serve_file(state, req).await);
    }

    let raw = req.uri().path();
    let Ok(path) = percent_decode_str(raw).decode_utf8() else {
        return Err(ServerError::NotFound(raw.to_owned()));
    };
    let path = path.into_owned();

    // Detached from the request future: a client disconnect must not cancel
    // a started render.
    let generator = Arc::clone(&state.generator);
    let task_path = path.clone();
    let resolution = tokio::spawn(async move { generator.resolve(&task_path).await }).await??;

    match resolution {
        Resolution::Missing => Err(ServerError::NotFound(path)),
        Resolution::Passthrough
        | Resolution::Static(_)
        | Resolution::Fresh(_)
        | Resolution::Rendered(_) => Ok(serve_file(state, req).await),
    }
}

/// Hand the request to the static responder over the content root.
async fn serve_file(state: &AppState, req: Request) -> Response {
    match state.files.clone().oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
