/// Texture trait, texture descriptor, and texture info

use crate::error::{Error, Result};
use crate::gpu::StagingBuffer;

/// Texture pixel format, chosen from the plane's channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8_UNORM,
    B8G8R8_UNORM,
    B8G8R8A8_UNORM,
}

impl TextureFormat {
    /// Format holding `channels` 8-bit components per texel
    ///
    /// Three-channel planes are laid out as BGR, four-channel planes as BGRA,
    /// matching what producers write into staging memory.
    pub fn from_channels(channels: u32) -> Result<Self> {
        match channels {
            1 => Ok(TextureFormat::R8_UNORM),
            2 => Ok(TextureFormat::R8G8_UNORM),
            3 => Ok(TextureFormat::B8G8R8_UNORM),
            4 => Ok(TextureFormat::B8G8R8A8_UNORM),
            n => Err(Error::InvalidResource(format!(
                "Unsupported channel count {} (expected 1 to 4)",
                n
            ))),
        }
    }

    /// Number of 8-bit channels per texel
    pub fn channels(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R8G8_UNORM => 2,
            TextureFormat::B8G8R8_UNORM => 3,
            TextureFormat::B8G8R8A8_UNORM => 4,
        }
    }
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// 8-bit channels per pixel (1 to 4)
    pub channels: u32,
}

impl TextureDesc {
    /// Bytes needed to fill the texture from a tightly packed buffer
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// 8-bit channels per pixel
    pub channels: u32,
    /// Pixel format
    pub format: TextureFormat,
}

impl TextureInfo {
    /// Build the info for a descriptor, validating its geometry
    pub fn from_desc(desc: &TextureDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "Texture extent {}x{} is empty",
                desc.width, desc.height
            )));
        }
        Ok(Self {
            width: desc.width,
            height: desc.height,
            channels: desc.channels,
            format: TextureFormat::from_channels(desc.channels)?,
        })
    }

    /// Bytes of tightly packed pixel data
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

// ===== TEXTURE TRAIT =====

/// GPU-resident texture
///
/// Shared through `Arc` between a frame and in-flight upload tasks.
/// Only the GPU thread calls [`Texture::read`]. The texture is released when
/// the last reference is dropped.
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;

    /// Upload the contents of `buffer` into this texture
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if the buffer holds fewer bytes than the texture.
    fn read(&self, buffer: &dyn StagingBuffer) -> Result<()>;
}

/// Check that `buffer` can fill a texture described by `info`
pub fn validate_upload(info: &TextureInfo, buffer: &dyn StagingBuffer) -> Result<()> {
    let needed = info.byte_size();
    if buffer.size() < needed {
        return Err(Error::InvalidResource(format!(
            "Staging buffer of {} bytes cannot fill a {}x{}x{} texture ({} bytes)",
            buffer.size(),
            info.width,
            info.height,
            info.channels,
            needed
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
