//! Frame Portal - Core Module
//!
//! Shared types, error taxonomy and the GPU-facing trait seams used by
//! the shared-memory transport and the consumer pipeline.

pub mod error;
pub mod frame;
pub mod gpu;

pub use error::*;
pub use frame::*;
pub use gpu::*;

/// Re-export common types
pub mod prelude {
    pub use crate::{
        error::{PortalError, Result},
        frame::{FrameDescriptor, PixelFormat, TextureId},
        gpu::{RenderBackend, TextureRegistry},
    };
}

/// Current version of the frame portal protocol
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
