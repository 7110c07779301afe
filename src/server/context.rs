//! Per-request lifecycle: a LIFO stack of deferred cleanup actions.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

/// Request-scoped cleanup registry.
///
/// Actions registered with `defer` run in reverse registration order
/// when the context is dropped, on every exit path. The main customer
/// is temp-file deletion for decoded file parameters; recorders close
/// through their own ownership.
#[derive(Default)]
pub struct RequestContext {
    deferred: Vec<Box<dyn FnOnce() + Send>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run at request finalization.
    pub fn defer(&mut self, action: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(action));
    }

    /// Register a temp file for deletion at request finalization.
    pub fn defer_remove_file(&mut self, path: PathBuf) {
        self.defer(move || {
            if let Err(error) = fs::remove_file(&path) {
                warn!(path = %path.display(), %error, "failed to remove temp file");
            }
        });
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        while let Some(action) = self.deferred.pop() {
            action();
        }
    }
}
