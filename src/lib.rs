//! Frame Portal
//!
//! Transports a fixed set of raw video/image streams from external
//! producer processes into this process's GPU texture pipeline. POSIX
//! shared memory carries the pixels, a counting semaphore wakes the
//! consumer, a binary semaphore serializes the per-slot headers, and
//! each slot keeps only its latest frame (no queueing, no backpressure).
//!
//! The hosting process supplies the GPU bindings through the
//! [`RenderBackend`] and [`TextureRegistry`] seams, builds a
//! [`TexturePipeline`], and routes `get_texture` method calls to
//! [`channel::handle_method_call`]. Producers link
//! `frame-portal-shared-memory` and publish through [`SlotWriter`], or
//! implement the same write contract in their own language.

pub mod channel;
pub mod pipeline;
mod render;

pub use channel::{handle_method_call, MethodCall, MethodResponse, CHANNEL, METHOD_GET_TEXTURE};
pub use pipeline::TexturePipeline;

pub use frame_portal_core::{
    FrameDescriptor, InternalFormat, PixelFormat, PortalError, RenderBackend, Result, TextureId,
    TextureRegistry, TextureTarget,
};
pub use frame_portal_shared_memory::{
    unlink_all, ControlRegion, DataSegment, ShmError, ShmNamespace, SlotHeader, SlotWriter,
    SLOT_CAPACITY, SLOT_COUNT,
};
