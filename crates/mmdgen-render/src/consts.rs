//! Internal constants for diagram rendering.

use std::time::Duration;

/// Default wall-clock limit for a single renderer run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to keep draining renderer stderr after the process has exited.
pub const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Extension of pure diagram definition files.
pub const DIAGRAM_EXTENSION: &str = "mmd";

/// Extension of markdown documents carrying an embedded diagram block.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Prefix of the temporary file the renderer writes before it is moved into place.
pub const TEMP_PREFIX: &str = ".mmdgen-";
