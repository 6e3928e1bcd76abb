/// StagingBuffer - host-visible Vulkan buffer the producer writes into

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use media_mixer::mixer::gpu::{BufferUsage, StagingBuffer, StagingBufferDesc};
use media_mixer::mixer::{Error, Result};
use media_mixer::mixer_err;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{allocation_error, GpuContext, SOURCE};

/// Persistently mapped staging buffer
pub struct VulkanStagingBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: usize,
    usage: BufferUsage,
}

impl VulkanStagingBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &StagingBufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("Staging buffer size must be non-zero".to_string()));
        }

        let (vk_usage, location) = if desc.usage.contains(BufferUsage::READ) {
            (vk::BufferUsageFlags::TRANSFER_DST, MemoryLocation::GpuToCpu)
        } else {
            (vk::BufferUsageFlags::TRANSFER_SRC, MemoryLocation::CpuToGpu)
        };

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size as u64)
                .usage(vk_usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| mixer_err!(SOURCE, "Failed to create staging buffer of {} bytes: {:?}", desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocated = match ctx.allocator.lock() {
                Ok(mut allocator) => allocator
                    .allocate(&AllocationCreateDesc {
                        name: "staging_buffer",
                        requirements,
                        location,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| allocation_error(e, "staging buffer", requirements.size)),
                Err(_) => Err(mixer_err!(SOURCE, "Allocator lock poisoned")),
            };
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // From here on Drop releases both the buffer and its memory
            let staging = Self {
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                usage: desc.usage,
                ctx,
            };

            let allocation = staging.allocation.as_ref().ok_or_else(|| {
                mixer_err!(SOURCE, "Staging buffer allocation missing")
            })?;
            staging
                .ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| mixer_err!(SOURCE, "Failed to bind staging buffer memory: {:?}", e))?;
            if allocation.mapped_ptr().is_none() {
                return Err(mixer_err!(SOURCE, "Staging buffer memory is not host-visible"));
            }

            staging.ctx.stats.staging_buffer_created();
            Ok(staging)
        }
    }
}

impl StagingBuffer for VulkanStagingBuffer {
    fn size(&self) -> usize {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_slice(&self) -> &[u8] {
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .map(|s| &s[..self.size])
            .unwrap_or(&[])
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        let size = self.size;
        match self.allocation.as_mut().and_then(|a| a.mapped_slice_mut()) {
            Some(slice) => &mut slice[..size],
            None => &mut [],
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanStagingBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
