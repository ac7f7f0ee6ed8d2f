//! Error types for the Warpfield application.

use crate::embedding::EmbeddingError;
use thiserror::Error;
use warpfield_env::EnvError;

/// Errors surfaced by the application and its renderers.
#[derive(Debug, Error)]
pub enum WarpError {
    /// A node index outside the field was addressed
    #[error("Unknown node index {index} (field has {len} nodes)")]
    UnknownNode { index: usize, len: usize },

    /// Configuration values that cannot produce a field
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The renderer failed to draw or record a frame
    #[error("Render error: {0}")]
    Render(String),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl WarpError {
    /// Creates a render error.
    pub fn render(msg: impl std::fmt::Display) -> Self {
        Self::Render(msg.to_string())
    }
}
