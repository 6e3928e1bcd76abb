/*!
# Media Mixer - Vulkan Backend

Headless Vulkan implementation of the media_mixer [`GpuDevice`](media_mixer::mixer::GpuDevice)
trait, built on Ash for the Vulkan bindings and gpu-allocator for memory.

Staging buffers live in host-visible memory and are mapped for their whole
lifetime; textures are optimal-tiled images filled by buffer-to-image copies
on the device's single queue.

```no_run
use media_mixer::mixer::{Engine, QueueConfig};
use media_mixer_vulkan::{VulkanConfig, VulkanGpuDevice};

Engine::initialize()?;
let device = VulkanGpuDevice::new(VulkanConfig::default())?;
let queue = Engine::create_gpu_queue(device, QueueConfig::default())?;
# Ok::<(), media_mixer::mixer::Error>(())
```

With the `vulkan-validation` feature, `VulkanConfig::enable_validation`
turns on `VK_LAYER_KHRONOS_validation` and routes its messages to the
mixer logger.
*/

mod vulkan;
mod vulkan_context;
mod vulkan_staging_buffer;
mod vulkan_texture;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::{DebugSeverity, VulkanConfig, VulkanGpuDevice};
pub use vulkan_staging_buffer::VulkanStagingBuffer;
pub use vulkan_texture::VulkanTexture;

#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, ValidationStats};
