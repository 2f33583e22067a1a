//! Frame description types shared between the transport and the GPU seam

use serde::{Deserialize, Serialize};

/// Registry-assigned texture identifier.
///
/// Created once per slot at pipeline startup and reused for the life of
/// the pipeline; only the texture's pixel content changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub i64);

impl TextureId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

/// Pixel layout of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel
    Rgba,
}

impl PixelFormat {
    /// Bytes occupied by one pixel in this format
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Map a slot header's bytes-per-pixel field to a format
    pub fn from_bytes_per_pixel(bpp: i32) -> Option<Self> {
        match bpp {
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }
}

/// Texture target type carried in a frame descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    Texture2d,
}

impl TextureTarget {
    /// GL enum value for backends that speak OpenGL
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureTarget::Texture2d => 0x0DE1, // GL_TEXTURE_2D
        }
    }
}

/// Internal storage format carried in a frame descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalFormat {
    Rgba8,
}

impl InternalFormat {
    /// GL enum value for backends that speak OpenGL
    pub fn gl_enum(self) -> u32 {
        match self {
            InternalFormat::Rgba8 => 0x8058, // GL_RGBA8
        }
    }
}

/// Descriptor handed to the presentation sink with each published frame.
///
/// Built once per consumer thread and reused; `name` is rewritten to the
/// GPU texture backing each publish, every other field stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub target: TextureTarget,
    pub internal_format: InternalFormat,
    /// GPU texture name backing this frame
    pub name: u64,
}

impl Default for FrameDescriptor {
    fn default() -> Self {
        Self {
            target: TextureTarget::Texture2d,
            internal_format: InternalFormat::Rgba8,
            name: 0,
        }
    }
}
