/// Pixel format descriptor: per-plane geometry of a frame
///
/// A planar format (e.g. Y'CbCr 4:2:0) is split into independent planes, each
/// with its own extent and channel count. The descriptor is produced elsewhere
/// and only carried here; the upload path reads plane geometry and never
/// interprets the [`PixelFormat`] tag.

/// Pixel layout tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Invalid,
    Gray,
    Bgra,
    Rgba,
    Argb,
    Abgr,
    Ycbcr,
    Ycbcra,
}

/// Geometry of one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// 8-bit channels per pixel
    pub channels: u32,
    /// Bytes of tightly packed plane data (`width * height * channels`)
    pub size: usize,
}

impl PlaneDesc {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
            size: width as usize * height as usize * channels as usize,
        }
    }
}

/// Ordered list of planes plus the pixel layout tag
///
/// Zero planes is allowed and produces frames with no image data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelFormatDesc {
    pub format: PixelFormat,
    pub planes: Vec<PlaneDesc>,
}

impl PixelFormatDesc {
    pub fn new(format: PixelFormat, planes: Vec<PlaneDesc>) -> Self {
        Self { format, planes }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Plane at `index`, if any
    pub fn plane(&self, index: usize) -> Option<&PlaneDesc> {
        self.planes.get(index)
    }

    /// Sum of all plane sizes in bytes
    pub fn total_size(&self) -> usize {
        self.planes.iter().map(|p| p.size).sum()
    }
}

#[cfg(test)]
#[path = "pixel_format_tests.rs"]
mod tests;
