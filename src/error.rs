//! Error types for the compositor and its renderer collaborator.

use thiserror::Error;

/// Failures reported by a [`Renderer`](crate::Renderer) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The renderer's style has not finished loading yet.
    #[error("renderer style is not loaded")]
    NotReady,

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("source already exists: {0}")]
    DuplicateSource(String),

    #[error("layer already exists: {0}")]
    DuplicateLayer(String),

    #[error("invalid renderer input: {0}")]
    InvalidInput(String),
}

/// Errors surfaced by compositor passes.
///
/// None of these are fatal: the caller retries the whole pass on the next
/// lifecycle event (style loaded, data changed, settings changed).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    /// The pass was skipped because the renderer is not ready.
    #[error("renderer not ready; pass deferred to the next style event")]
    RendererNotReady,

    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),
}

impl CompositorError {
    /// Returns true if the failure only means "try again on the next event".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RendererNotReady | Self::Renderer(RendererError::NotReady)
        )
    }
}

/// Errors produced while decoding layer catalogs and layer payloads.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed layer script: {0}")]
    MalformedScript(String),
}

/// Result alias for compositor operations.
pub type Result<T> = std::result::Result<T, CompositorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_is_transient() {
        assert!(CompositorError::RendererNotReady.is_transient());
        assert!(CompositorError::from(RendererError::NotReady).is_transient());
        assert!(!CompositorError::from(RendererError::UnknownLayer("x".into())).is_transient());
        assert!(!CompositorError::from(RendererError::InvalidInput("bad".into())).is_transient());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = CompositorError::from(RendererError::DuplicateLayer("qgis-line-a".into()));
        assert_eq!(
            err.to_string(),
            "renderer error: layer already exists: qgis-line-a"
        );
    }
}
