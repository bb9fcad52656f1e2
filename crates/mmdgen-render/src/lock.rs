//! Per-artifact render serialization.
//!
//! Two requests for the same stale artifact must not both run the renderer.
//! [`RenderLocks`] hands out one async mutex per destination path; the second
//! requester waits for the first render and then re-checks staleness.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::OwnedMutexGuard;

/// Guard held while rendering one artifact.
pub type RenderGuard = OwnedMutexGuard<()>;

/// Registry of in-flight render locks keyed by artifact path.
///
/// Entries are weak, so a path's lock disappears once nobody holds or waits
/// for it.
#[derive(Default)]
pub struct RenderLocks {
    locks: Mutex<HashMap<PathBuf, Weak<tokio::sync::Mutex<()>>>>,
}

impl RenderLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task is rendering `artifact`, then lock it.
    pub async fn acquire(&self, artifact: &Path) -> RenderGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, weak| weak.strong_count() > 0);

            if let Some(existing) = locks.get(artifact).and_then(Weak::upgrade) {
                existing
            } else {
                let fresh = Arc::new(tokio::sync::Mutex::new(()));
                locks.insert(artifact.to_path_buf(), Arc::downgrade(&fresh));
                fresh
            }
        };

        lock.lock_owned().await
    }

    /// Number of paths with a live lock.
    #[cfg(test)]
    fn live(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
