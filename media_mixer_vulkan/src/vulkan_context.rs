/// GpuContext - Vulkan state shared by the device and every resource it creates
///
/// Staging buffers and textures each hold an `Arc<GpuContext>`, so the Vulkan
/// device, allocator and instance stay alive until the last resource is gone,
/// even when a frame outlives the `VulkanGpuDevice` (frames released after the
/// GPU queue shut down).

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use gpu_allocator::AllocationError;
use media_mixer::mixer::gpu::DeviceStats;
use media_mixer::mixer::{Error, Result};
use media_mixer::{mixer_err, mixer_error};
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

pub(crate) const SOURCE: &str = "mixer::vulkan";

/// Command buffer and fence reused by every upload
pub(crate) struct UploadContext {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

/// Device counters, updated from resource constructors and uploads
#[derive(Default)]
pub(crate) struct StatsCounters {
    staging_buffers_created: AtomicU64,
    textures_created: AtomicU64,
    uploads: AtomicU64,
    bytes_uploaded: AtomicU64,
}

impl StatsCounters {
    pub fn staging_buffer_created(&self) {
        self.staging_buffers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn texture_created(&self) {
        self.textures_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_done(&self, bytes: usize) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeviceStats {
        DeviceStats {
            staging_buffers_created: self.staging_buffers_created.load(Ordering::Relaxed),
            textures_created: self.textures_created.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
        }
    }
}

pub struct GpuContext {
    /// Loaded Vulkan library, must outlive the instance
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) queue: vk::Queue,
    pub(crate) queue_family: u32,
    /// Whether `queue_family` supports graphics (textures are then sampled by fragment shaders)
    pub(crate) graphics_queue: bool,

    pub(crate) upload: Mutex<UploadContext>,
    pub(crate) stats: StatsCounters,

    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug_messenger: Option<crate::debug::DebugMessenger>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queue: vk::Queue,
        queue_family: u32,
        graphics_queue: bool,
        upload: UploadContext,
        #[cfg(feature = "vulkan-validation")] debug_messenger: Option<crate::debug::DebugMessenger>,
    ) -> Self {
        Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue,
            queue_family,
            graphics_queue,
            upload: Mutex::new(upload),
            stats: StatsCounters::default(),
            #[cfg(feature = "vulkan-validation")]
            debug_messenger,
        }
    }

    /// Record commands with `record`, submit them and wait for completion
    ///
    /// Uploads are serialized on the context's single command buffer.
    pub(crate) fn submit_upload<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let upload = self
            .upload
            .lock()
            .map_err(|_| mixer_err!(SOURCE, "Upload context lock poisoned"))?;

        unsafe {
            self.device
                .reset_command_buffer(upload.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| mixer_err!(SOURCE, "Failed to reset upload command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(upload.command_buffer, &begin_info)
                .map_err(|e| mixer_err!(SOURCE, "Failed to begin upload command buffer: {:?}", e))?;

            record(&self.device, upload.command_buffer);

            self.device
                .end_command_buffer(upload.command_buffer)
                .map_err(|e| mixer_err!(SOURCE, "Failed to end upload command buffer: {:?}", e))?;

            let command_buffers = [upload.command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            self.device
                .queue_submit(self.queue, &[submit_info], upload.fence)
                .map_err(|e| mixer_err!(SOURCE, "Failed to submit upload: {:?}", e))?;

            self.device
                .wait_for_fences(&[upload.fence], true, u64::MAX)
                .map_err(|e| mixer_err!(SOURCE, "Failed to wait for upload fence: {:?}", e))?;
            self.device
                .reset_fences(&[upload.fence])
                .map_err(|e| mixer_err!(SOURCE, "Failed to reset upload fence: {:?}", e))?;
        }
        Ok(())
    }

    /// Whether optimal-tiled images of `format` can be sampled and copied into
    pub(crate) fn supports_texture_format(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        properties.optimal_tiling_features.contains(
            vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::TRANSFER_DST,
        )
    }
}

/// Translate an allocator failure, keeping `Error::OutOfMemory` distinct
pub(crate) fn allocation_error(error: AllocationError, what: &str, size: u64) -> Error {
    match error {
        AllocationError::OutOfMemory => {
            let size_mb = size as f64 / (1024.0 * 1024.0);
            mixer_error!(SOURCE, "Out of GPU memory for {} ({:.2} MB)", what, size_mb);
            Error::OutOfMemory
        }
        other => mixer_err!(SOURCE, "Failed to allocate {}: {}", what, other),
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            let upload = self.upload.get_mut().unwrap_or_else(PoisonError::into_inner);
            self.device.destroy_fence(upload.fence, None);
            self.device.destroy_command_pool(upload.command_pool, None);

            // Free VkDeviceMemory pages before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            #[cfg(feature = "vulkan-validation")]
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
