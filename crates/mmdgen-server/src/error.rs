//! Error types for the HTTP server.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mmdgen_render::RenderError;

/// Request failure, rendered as a plain-text response.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Nothing to serve at the given path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source inspection, extraction or rendering failed.
    #[error("{0}")]
    Render(#[from] RenderError),

    /// The render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Render(RenderError::NoDiagramBlock { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Render(
                RenderError::SourceStat { source, .. } | RenderError::SourceRead { source, .. },
            ) => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Render(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, format!("{self}\n")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    fn stat_error(kind: io::ErrorKind) -> ServerError {
        ServerError::Render(RenderError::SourceStat {
            path: PathBuf::from("d.mmd"),
            source: io::Error::from(kind),
        })
    }

    #[test]
    fn test_not_found_statuses() {
        assert_eq!(
            ServerError::NotFound("/x.png".to_owned()).status(),
            StatusCode::NOT_FOUND
        );
        let no_block = ServerError::Render(RenderError::NoDiagramBlock {
            path: PathBuf::from("d.md"),
            tag: "mermaid".to_owned(),
        });
        assert_eq!(no_block.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_source_statuses() {
        assert_eq!(
            stat_error(io::ErrorKind::PermissionDenied).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            stat_error(io::ErrorKind::Other).status(),
            StatusCode::BAD_GATEWAY
        );
        let unreadable = ServerError::Render(RenderError::SourceRead {
            path: PathBuf::from("d.md"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(unreadable.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_render_statuses() {
        let failed = ServerError::Render(RenderError::Failed {
            exit_code: Some(1),
            stderr: "bad".to_owned(),
        });
        let timeout = ServerError::Render(RenderError::Timeout {
            timeout: Duration::from_secs(1),
        });
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
