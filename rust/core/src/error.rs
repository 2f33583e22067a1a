//! Error types for the frame portal pipeline

use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PortalError {
    /// Resource allocation failed during lazy initialization
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Operation requires an initialized pipeline
    #[error("pipeline is not initialized")]
    NotInitialized,

    /// GPU rendering context could not be created
    #[error("render context creation failed: {0}")]
    ContextCreationFailed(String),

    /// Shared memory transport failure
    #[error("shared memory error: {0}")]
    SharedMemory(String),

    /// Texture registry failure
    #[error("texture registry error: {0}")]
    Registry(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// Whether the caller may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        match self {
            PortalError::InitializationFailed(_) => true,
            PortalError::NotInitialized => true,
            PortalError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
