/// Staging buffer trait and staging buffer descriptor

use std::any::Any;
use bitflags::bitflags;

bitflags! {
    /// CPU access a staging buffer is created for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Producer writes, GPU reads (upload direction)
        const WRITE = 0b01;
        /// GPU writes, consumer reads (readback direction)
        const READ = 0b10;
    }
}

impl BufferUsage {
    /// Usage of upload staging buffers
    pub fn write_only() -> Self {
        BufferUsage::WRITE
    }

    /// Usage of readback staging buffers
    pub fn read_only() -> Self {
        BufferUsage::READ
    }
}

/// Descriptor for creating a staging buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingBufferDesc {
    /// Size in bytes
    pub size: usize,
    /// CPU access
    pub usage: BufferUsage,
}

/// CPU-visible staging memory
///
/// Created and destroyed on the GPU thread only. Between creation and the
/// plane's commit it is owned by exactly one frame and written by the producer;
/// after commit it is owned by the upload task and read by the GPU thread.
/// The buffer is released when dropped.
pub trait StagingBuffer: Send {
    /// Size in bytes
    fn size(&self) -> usize;

    /// CPU access this buffer was created for
    fn usage(&self) -> BufferUsage;

    /// Read-only view of the whole buffer
    fn as_slice(&self) -> &[u8];

    /// Writable view of the whole buffer
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Backend downcast hook (e.g. to reach the native buffer handle during upload)
    fn as_any(&self) -> &dyn Any;
}
