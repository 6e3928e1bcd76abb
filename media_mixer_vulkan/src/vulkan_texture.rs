/// Texture - Vulkan implementation of the mixer Texture trait
///
/// A 2D optimal-tiled image with one mip level, filled from staging buffers
/// by `read`. Between uploads the image stays in SHADER_READ_ONLY_OPTIMAL.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use media_mixer::mixer::gpu::{
    validate_upload, StagingBuffer, Texture, TextureDesc, TextureFormat, TextureInfo,
};
use media_mixer::mixer::{Error, Result};
use media_mixer::{mixer_err, mixer_trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vulkan_context::{allocation_error, GpuContext, SOURCE};
use crate::vulkan_staging_buffer::VulkanStagingBuffer;

/// Vulkan format of a mixer texture format
pub(crate) fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8_UNORM => vk::Format::R8_UNORM,
        TextureFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        TextureFormat::B8G8R8_UNORM => vk::Format::B8G8R8_UNORM,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    info: TextureInfo,
    /// Set after the first upload; the image is in UNDEFINED layout before
    uploaded: AtomicBool,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let info = TextureInfo::from_desc(desc)?;
        let format = texture_format_to_vk(info.format);
        if !ctx.supports_texture_format(format) {
            return Err(Error::InvalidResource(format!(
                "{:?} textures are not supported by this GPU",
                format
            )));
        }

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: info.width,
                    height: info.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| mixer_err!(SOURCE, "Failed to create texture image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocated = match ctx.allocator.lock() {
                Ok(mut allocator) => allocator
                    .allocate(&AllocationCreateDesc {
                        name: "texture",
                        requirements,
                        location: MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| allocation_error(e, "texture", requirements.size)),
                Err(_) => Err(mixer_err!(SOURCE, "Allocator lock poisoned")),
            };
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // Drop releases whatever has been created so far
            let mut texture = Self {
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                info,
                uploaded: AtomicBool::new(false),
                ctx,
            };

            if let Some(allocation) = texture.allocation.as_ref() {
                texture
                    .ctx
                    .device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| mixer_err!(SOURCE, "Failed to bind texture image memory: {:?}", e))?;
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(color_range());

            texture.view = texture
                .ctx
                .device
                .create_image_view(&view_create_info, None)
                .map_err(|e| mixer_err!(SOURCE, "Failed to create texture image view: {:?}", e))?;

            texture.ctx.stats.texture_created();
            Ok(texture)
        }
    }
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn read(&self, buffer: &dyn StagingBuffer) -> Result<()> {
        validate_upload(&self.info, buffer)?;
        let staging = buffer
            .as_any()
            .downcast_ref::<VulkanStagingBuffer>()
            .ok_or_else(|| {
                Error::InvalidResource("Staging buffer was not created by the Vulkan device".to_string())
            })?;

        let previously_uploaded = self.uploaded.load(Ordering::Acquire);
        let (old_layout, src_stage, src_access) = if previously_uploaded {
            (
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::AccessFlags::SHADER_READ,
            )
        } else {
            (
                vk::ImageLayout::UNDEFINED,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::AccessFlags::empty(),
            )
        };
        let (consumer_stage, consumer_access) = if self.ctx.graphics_queue {
            (vk::PipelineStageFlags::FRAGMENT_SHADER, vk::AccessFlags::SHADER_READ)
        } else {
            (vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty())
        };

        let image = self.image;
        let (width, height) = (self.info.width, self.info.height);
        self.ctx.submit_upload(|device, command_buffer| unsafe {
            // old layout -> TRANSFER_DST_OPTIMAL
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(old_layout)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(color_range())
                .src_access_mask(src_access)
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            // Tightly packed rows
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width, height, depth: 1 });
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            // TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL
            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(color_range())
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(consumer_access);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                consumer_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })?;

        self.uploaded.store(true, Ordering::Release);
        let bytes = self.info.byte_size();
        self.ctx.stats.upload_done(bytes);
        mixer_trace!(SOURCE, "Uploaded {} bytes into {}x{} texture", bytes, width, height);
        Ok(())
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
