//! Error types for module authors

use thiserror::Error;

/// Errors a module can report back to the host
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// Module initialization failed
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl ExtensionError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create an initialization error
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization(message.into())
    }
}
