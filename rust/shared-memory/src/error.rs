//! Shared memory specific error types

use frame_portal_core::PortalError;
use nix::errno::Errno;
use thiserror::Error;

/// Shared memory error types
#[derive(Error, Debug)]
pub enum ShmError {
    /// Object could not be opened or created
    #[error("shared memory unavailable: {context}: {errno}")]
    ResourceUnavailable { context: &'static str, errno: Errno },

    /// Invalid object name
    #[error("invalid shared memory name: {0}")]
    InvalidName(String),

    /// Mapped object smaller than the protocol requires
    #[error("shared memory object {name} holds {actual} bytes, need {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Memory mapping failed
    #[error("memory mapping failed: {0}")]
    MapFailed(String),

    /// Slot index outside the fixed slot range
    #[error("slot {slot} out of range (0..{count})")]
    NoSuchSlot { slot: usize, count: usize },

    /// Frame larger than the slot's data segment
    #[error("frame of {required} bytes exceeds slot capacity of {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },

    /// Source buffer shorter than the dimensions claim
    #[error("pixel buffer holds {provided} bytes, dimensions require {required}")]
    TruncatedFrame { provided: usize, required: usize },

    /// Semaphore operation failed
    #[error("semaphore operation failed: {context}: {errno}")]
    Semaphore { context: &'static str, errno: Errno },
}

/// Convenience type alias
pub type Result<T> = std::result::Result<T, ShmError>;

impl ShmError {
    /// Wrap a failed OS call
    pub(crate) fn os(context: &'static str, errno: Errno) -> Self {
        ShmError::ResourceUnavailable { context, errno }
    }

    /// Wrap a failed semaphore call using the thread's current errno
    pub(crate) fn sem(context: &'static str) -> Self {
        ShmError::Semaphore {
            context,
            errno: Errno::last(),
        }
    }
}

impl From<ShmError> for PortalError {
    fn from(err: ShmError) -> Self {
        PortalError::SharedMemory(err.to_string())
    }
}
