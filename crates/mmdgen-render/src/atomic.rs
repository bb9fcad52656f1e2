//! Write-then-rename publishing of generated files.
//!
//! Artifacts and extracted definitions are written to a temporary sibling
//! and renamed over the destination, so a concurrent reader sees either the
//! previous file or the complete new one.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::consts::TEMP_PREFIX;
use crate::error::RenderError;

/// Reserve a temporary file next to `destination` with the same extension.
pub(crate) fn temp_sibling(destination: &Path) -> Result<NamedTempFile, RenderError> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let suffix = destination
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| RenderError::io(dir, e))
}

/// Move the finished temporary file over `destination`.
pub(crate) fn publish(temp: NamedTempFile, destination: &Path) -> Result<(), RenderError> {
    // Temporary files are created owner-only; published files are ordinary static files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(|e| RenderError::io(temp.path(), e))?;
    }

    temp.persist(destination)
        .map(drop)
        .map_err(|e| RenderError::io(destination, e.error))
}
