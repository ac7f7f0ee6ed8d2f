//! Error types for the Warpfield environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The host side of the input channel was dropped
    #[error("Input channel closed")]
    InputClosed,

    /// A viewport with a zero dimension was reported
    #[error("Invalid viewport: {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
}

impl EnvError {
    /// Creates a context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextError(msg.into())
    }
}
