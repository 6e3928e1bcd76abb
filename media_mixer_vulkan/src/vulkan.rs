/// VulkanGpuDevice - headless Vulkan implementation of the mixer GpuDevice
///
/// No window or surface: one logical device with a single queue (graphics if
/// available, otherwise transfer) used for texture uploads.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use media_mixer::mixer::gpu::{
    DeviceStats, GpuDevice, StagingBuffer, StagingBufferDesc, Texture, TextureDesc,
};
use media_mixer::mixer::{Error, Result};
use media_mixer::{mixer_err, mixer_error, mixer_info, mixer_warn};
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, UploadContext, SOURCE};
use crate::vulkan_staging_buffer::VulkanStagingBuffer;
use crate::vulkan_texture::VulkanTexture;

/// Validation messages forwarded to the mixer logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Vulkan device configuration
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable VK_LAYER_KHRONOS_validation (needs the `vulkan-validation` feature)
    pub enable_validation: bool,
    /// Which validation messages reach the logger
    pub debug_severity: DebugSeverity,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            app_name: "media_mixer".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
        }
    }
}

/// Pick the queue family used for uploads: graphics first, then transfer-only
///
/// Returns `(family index, supports graphics)`.
pub(crate) fn select_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<(u32, bool)> {
    let usable = |flags: vk::QueueFlags| families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(flags))
        .map(|index| index as u32);

    usable(vk::QueueFlags::GRAPHICS)
        .map(|index| (index, true))
        .or_else(|| usable(vk::QueueFlags::TRANSFER).map(|index| (index, false)))
}

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    mixer_error!(SOURCE, "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

pub struct VulkanGpuDevice {
    ctx: Arc<GpuContext>,
    device_name: String,
}

impl VulkanGpuDevice {
    /// Create a headless device on the first GPU with a graphics or transfer queue
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the Vulkan library, instance, device,
    /// allocator or upload objects cannot be created.
    pub fn new(config: VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("Failed to load Vulkan library", e))?;

            let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
            if config.enable_validation && !validation {
                mixer_warn!(SOURCE, "Validation requested but the vulkan-validation feature is disabled");
            }

            let app_name = CString::new(config.app_name.clone())
                .map_err(|e| init_error("Invalid application name", e))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"media_mixer")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                Some(crate::debug::DebugMessenger::new(&entry, &instance, config.debug_severity)?)
            } else {
                None
            };

            // Pick Physical Device
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_error("Failed to enumerate physical devices", e))?;

            let (physical_device, queue_family, graphics_queue) = physical_devices
                .into_iter()
                .find_map(|pd| {
                    let families = instance.get_physical_device_queue_family_properties(pd);
                    select_queue_family(&families).map(|(family, graphics)| (pd, family, graphics))
                })
                .ok_or_else(|| {
                    mixer_error!(SOURCE, "No Vulkan GPU with a graphics or transfer queue found");
                    Error::InitializationFailed("No Vulkan GPU with a graphics or transfer queue found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());

            // Create Logical Device
            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];
            let device_create_info = vk::DeviceCreateInfo::default().queue_create_infos(&queue_create_infos);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error("Failed to create logical device", e))?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error("Failed to create GPU allocator", e))?;

            // Upload command pool (RESET so the single command buffer can be reused)
            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = device
                .create_command_pool(&pool_create_info, None)
                .map_err(|e| init_error("Failed to create upload command pool", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| init_error("Failed to allocate upload command buffer", e))?
                .into_iter()
                .next()
                .ok_or_else(|| init_error("Failed to allocate upload command buffer", "empty result"))?;

            let fence = device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| init_error("Failed to create upload fence", e))?;

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                allocator,
                queue,
                queue_family,
                graphics_queue,
                UploadContext { command_pool, command_buffer, fence },
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            ));

            mixer_info!(
                SOURCE,
                "Vulkan device '{}' ready (queue family {}, {}, validation {})",
                device_name,
                queue_family,
                if graphics_queue { "graphics" } else { "transfer-only" },
                if validation { "on" } else { "off" }
            );

            Ok(Self { ctx, device_name })
        }
    }

    /// Name of the physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl GpuDevice for VulkanGpuDevice {
    fn create_staging_buffer(&mut self, desc: &StagingBufferDesc) -> Result<Box<dyn StagingBuffer>> {
        Ok(Box::new(VulkanStagingBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), desc)?))
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| mixer_err!(SOURCE, "Failed to wait idle: {:?}", e))
        }
    }

    fn stats(&self) -> DeviceStats {
        self.ctx.stats.snapshot()
    }
}

impl Drop for VulkanGpuDevice {
    fn drop(&mut self) {
        // Device objects are destroyed with the GpuContext, once the last
        // texture or staging buffer referencing it is gone
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
