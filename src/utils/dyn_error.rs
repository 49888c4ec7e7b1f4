//! Provides [DynError].
use std::sync::Arc;

/// Shareable wrapper around any transport error.
///
/// Cloning is cheap so the same error can be handed to the `on_error` hook
/// and returned to the caller.
#[derive(Debug, Clone)]
pub struct DynError(Arc<dyn std::error::Error + Send + Sync>);

impl DynError {
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }
}

impl std::fmt::Display for DynError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for DynError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
