/*!
# Media Mixer

Write-side frames for a video/audio mixer: producers fill CPU staging memory
plane by plane, commit, and the pixels are uploaded to GPU textures on a
single GPU thread.

## Architecture

- **GpuDevice**: backend factory for staging buffers and textures
- **GpuQueue**: the GPU thread, owning the device and running prioritized tasks
- **WriteFrame**: per-plane staging buffers and textures plus audio samples
- **Frame / FrameVisitor**: how pipeline stages walk over frames
- **PixelFormatDesc**: per-plane geometry a frame is allocated from

Backends (e.g. `media_mixer_vulkan`) only implement the `gpu` traits; a
CPU-only [`MockGpuDevice`](crate::gpu::mock_gpu_device::MockGpuDevice) ships
with the crate for tests and headless runs.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod gpu;
pub mod frame;
pub mod pixel_format;

// Main mixer namespace module
pub mod mixer {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Core types
    pub use crate::frame::{CompositeFrame, EmptyFrame, Frame, FrameVisitor, WriteFrame};
    pub use crate::gpu::{GpuDevice, GpuQueue, Priority, QueueConfig, QueueStats};
    pub use crate::pixel_format::{PixelFormat, PixelFormatDesc, PlaneDesc};

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // GPU sub-module with resource traits, queue and mock device
    pub mod gpu {
        pub use crate::gpu::*;
    }
}
