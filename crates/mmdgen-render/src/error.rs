//! Error type for the render pipeline.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Failure while resolving, extracting or rendering a diagram.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The markdown document holds no diagram block with the configured tag.
    #[error("no `{tag}` code block found in {}", path.display())]
    NoDiagramBlock {
        /// Markdown document that was scanned.
        path: PathBuf,
        /// Fence tag that was searched for.
        tag: String,
    },

    /// The source document exists but could not be inspected.
    #[error("cannot stat source {}: {source}", path.display())]
    SourceStat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source document exists but could not be read.
    #[error("cannot read source {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The renderer process could not be started.
    #[error("failed to launch renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The renderer exited unsuccessfully.
    #[error("renderer exited with {}: {stderr}", exit_label(*exit_code))]
    Failed {
        /// Exit code, `None` when the process was killed by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The renderer exceeded its deadline and was killed.
    #[error("renderer timed out after {}s", timeout.as_secs_f64())]
    Timeout { timeout: Duration },
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}"))
}
