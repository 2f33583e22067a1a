//! Trait seams for the GPU rendering context and the presentation sink
//!
//! The consumer loop is written against these traits; the hosting
//! process supplies the real EGL/GL and texture-registry bindings, and
//! the test suite supplies recording fakes.

use crate::{FrameDescriptor, PixelFormat, Result, TextureId};

/// GPU rendering backend owned by the consumer thread.
///
/// One backend instance is moved onto the consumer thread and never
/// leaves it. Context-current state is per-thread: the loop makes the
/// context current for each sweep and clears it before blocking so idle
/// periods never retain GPU state.
pub trait RenderBackend: Send + 'static {
    /// GPU-side texture name, distinct from the registry's [`TextureId`]
    type Texture: Copy + Send + Into<u64>;

    /// Create the rendering context bound to the calling thread.
    ///
    /// Failure here is fatal to the consumer thread; there are no
    /// retries.
    fn create_context(&mut self) -> Result<()>;

    /// Make the context current on the calling thread
    fn make_current(&mut self) -> Result<()>;

    /// Detach the context from the calling thread
    fn clear_current(&mut self);

    /// Allocate `count` texture names
    fn create_textures(&mut self, count: usize) -> Result<Vec<Self::Texture>>;

    /// Replace a texture's pixel content with `pixels`, sized exactly
    /// `width * height` at `format`
    fn upload(
        &mut self,
        texture: Self::Texture,
        format: PixelFormat,
        width: i32,
        height: i32,
        pixels: &[u8],
    ) -> Result<()>;

    /// Release previously created texture names
    fn delete_textures(&mut self, textures: &[Self::Texture]);

    /// Destroy the rendering context
    fn destroy_context(&mut self);
}

/// Presentation-side texture registry.
///
/// Hands out consumer-visible texture identifiers and accepts decoded
/// frames for display. Shared between the lifecycle controller (which
/// creates textures) and the consumer thread (which pushes frames).
pub trait TextureRegistry: Send + Sync + 'static {
    /// Register a new texture placeholder and return its identifier
    fn create_texture(&self) -> Result<TextureId>;

    /// Publish a frame to the display pipeline for `texture`
    fn push_frame(&self, texture: TextureId, frame: &FrameDescriptor) -> Result<()>;
}
