/// GPU device trait - factory for staging buffers and textures

use std::sync::Arc;

use crate::error::Result;
use crate::gpu::{StagingBuffer, StagingBufferDesc, Texture, TextureDesc};

/// Device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Staging buffers created since the device was opened
    pub staging_buffers_created: u64,
    /// Textures created since the device was opened
    pub textures_created: u64,
    /// Completed texture uploads
    pub uploads: u64,
    /// Bytes moved by completed uploads
    pub bytes_uploaded: u64,
}

/// GPU device
///
/// Implemented by backends (e.g. `VulkanGpuDevice`, [`MockGpuDevice`](crate::gpu::mock_gpu_device::MockGpuDevice)).
/// A device is moved into a [`GpuQueue`](crate::gpu::GpuQueue) and from then on is
/// only ever called from the queue's worker thread.
pub trait GpuDevice: Send {
    /// Create a CPU-visible staging buffer
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the device cannot back the allocation.
    fn create_staging_buffer(&mut self, desc: &StagingBufferDesc) -> Result<Box<dyn StagingBuffer>>;

    /// Create a GPU-resident texture
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the device cannot back the allocation,
    /// `Error::InvalidResource` for an unsupported geometry.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Block until all GPU work submitted by this device has finished
    fn wait_idle(&mut self) -> Result<()>;

    /// Allocation and upload counters
    fn stats(&self) -> DeviceStats;
}
