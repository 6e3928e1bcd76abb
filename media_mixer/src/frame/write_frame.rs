/// WriteFrame - producer-side frame staging pixels for upload
///
/// A frame owns, per plane of its [`PixelFormatDesc`], one CPU-writable
/// staging buffer and one GPU texture, plus the audio samples that travel
/// with the picture. All three resource operations run on the GPU thread:
///
/// - construction allocates every plane with one blocking high-priority call
/// - [`WriteFrame::commit_plane`] moves the plane's staging buffer into a
///   fire-and-forget normal-priority upload task
/// - dropping the frame releases what is left with one blocking
///   high-priority call
///
/// Textures are shared with in-flight upload tasks through `Arc`, so a frame
/// may be dropped while its uploads are still queued.

use std::sync::Arc;

use crate::error::Result;
use crate::frame::{Frame, FrameVisitor};
use crate::gpu::{
    BufferUsage, GpuDevice, GpuQueue, Priority, StagingBuffer, StagingBufferDesc, Texture,
    TextureDesc,
};
use crate::pixel_format::{PixelFormatDesc, PlaneDesc};
use crate::{mixer_debug, mixer_trace, mixer_warn};

const SOURCE: &str = "mixer::WriteFrame";

type PlaneResources = (Vec<Box<dyn StagingBuffer>>, Vec<Arc<dyn Texture>>);

pub struct WriteFrame {
    queue: Arc<GpuQueue>,
    tag: i32,
    desc: PixelFormatDesc,
    buffers: Vec<Option<Box<dyn StagingBuffer>>>,
    textures: Vec<Arc<dyn Texture>>,
    audio_data: Vec<i16>,
}

impl WriteFrame {
    /// Allocate a frame for `desc` on `queue`'s GPU thread
    ///
    /// Blocks until every plane has its staging buffer and texture. On failure
    /// whatever was already allocated is released on the GPU thread before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// - `Error::OutOfMemory` when the device runs out of memory
    /// - `Error::InvalidResource` for plane geometry the device rejects
    /// - `Error::QueueClosed` after the queue has shut down
    /// - `Error::BackendError` when called on the GPU thread itself
    pub fn new(queue: &Arc<GpuQueue>, tag: i32, desc: &PixelFormatDesc) -> Result<Self> {
        let planes = desc.planes.clone();
        let (buffers, textures) =
            queue.invoke(Priority::High, move |device| allocate_planes(device, &planes))??;

        mixer_debug!(SOURCE, "Frame {} allocated with {} plane(s), {} bytes", tag, desc.plane_count(), desc.total_size());

        Ok(Self {
            queue: Arc::clone(queue),
            tag,
            desc: desc.clone(),
            buffers: buffers.into_iter().map(Some).collect(),
            textures,
            audio_data: Vec::new(),
        })
    }

    // ===== IMAGE =====

    /// Writable staging bytes of `plane`
    ///
    /// Empty for an out-of-range plane or once the plane is committed.
    pub fn image_data_mut(&mut self, plane: usize) -> &mut [u8] {
        match self.buffers.get_mut(plane) {
            Some(Some(buffer)) => buffer.as_mut_slice(),
            _ => &mut [],
        }
    }

    /// Staging bytes of `plane`, empty under the same conditions as [`WriteFrame::image_data_mut`]
    pub fn image_data(&self, plane: usize) -> &[u8] {
        match self.buffers.get(plane) {
            Some(Some(buffer)) => buffer.as_slice(),
            _ => &[],
        }
    }

    // ===== AUDIO =====

    pub fn audio_data_mut(&mut self) -> &mut Vec<i16> {
        &mut self.audio_data
    }

    pub fn audio_data(&self) -> &[i16] {
        &self.audio_data
    }

    /// Audio samples as native-endian PCM bytes
    pub fn audio_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.audio_data)
    }

    // ===== COMMIT =====

    /// Hand the staging buffer of `plane` to an upload task and return
    ///
    /// No-op for an out-of-range or already committed plane. The upload runs
    /// on the GPU thread after all normal-priority work queued before it;
    /// upload failures are logged by the queue.
    pub fn commit_plane(&mut self, plane: usize) {
        let Some(buffer) = self.buffers.get_mut(plane).and_then(Option::take) else {
            return;
        };
        let texture = Arc::clone(&self.textures[plane]);
        let tag = self.tag;

        mixer_trace!(SOURCE, "Frame {} commit plane {} ({} bytes)", tag, plane, buffer.size());
        self.queue.begin_invoke(Priority::Normal, move |_| {
            texture.read(&*buffer)?;
            mixer_trace!(SOURCE, "Frame {} plane {} uploaded", tag, plane);
            Ok(())
        });
    }

    /// Commit every plane in ascending order
    pub fn commit(&mut self) {
        for plane in 0..self.buffers.len() {
            self.commit_plane(plane);
        }
    }

    /// Whether the staging buffer of `plane` has been handed off (false when out of range)
    pub fn is_committed(&self, plane: usize) -> bool {
        matches!(self.buffers.get(plane), Some(None))
    }

    // ===== ACCESSORS =====

    pub fn pixel_format_desc(&self) -> &PixelFormatDesc {
        &self.desc
    }

    pub fn plane_count(&self) -> usize {
        self.desc.plane_count()
    }

    pub fn textures(&self) -> &[Arc<dyn Texture>] {
        &self.textures
    }

    pub fn buffers(&self) -> &[Option<Box<dyn StagingBuffer>>] {
        &self.buffers
    }

    /// Queue this frame's resources live on
    pub fn queue(&self) -> &Arc<GpuQueue> {
        &self.queue
    }
}

impl Frame for WriteFrame {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn accept(&mut self, visitor: &mut dyn FrameVisitor) {
        visitor.begin(&*self);
        visitor.visit(self);
        visitor.end();
    }
}

impl Drop for WriteFrame {
    fn drop(&mut self) {
        let buffers: Vec<Box<dyn StagingBuffer>> = self.buffers.drain(..).flatten().collect();
        let textures = std::mem::take(&mut self.textures);
        if buffers.is_empty() && textures.is_empty() {
            return;
        }

        if self.queue.is_gpu_thread() {
            drop(buffers);
            drop(textures);
            return;
        }

        let tag = self.tag;
        let released = self.queue.invoke(Priority::High, move |_| {
            let count = (buffers.len(), textures.len());
            drop(buffers);
            drop(textures);
            count
        });
        match released {
            Ok((buffers, textures)) => {
                mixer_trace!(SOURCE, "Frame {} released {} staging buffer(s), {} texture(s)", tag, buffers, textures);
            }
            // The rejected task has already dropped the resources on this thread
            Err(e) => mixer_warn!(SOURCE, "Frame {} released off the GPU thread: {}", tag, e),
        }
    }
}

/// Create one staging buffer and one texture per plane
///
/// Runs on the GPU thread. On error the partial vectors drop here, still on
/// the GPU thread.
fn allocate_planes(device: &mut dyn GpuDevice, planes: &[PlaneDesc]) -> Result<PlaneResources> {
    let mut buffers = Vec::with_capacity(planes.len());
    let mut textures = Vec::with_capacity(planes.len());
    for plane in planes {
        buffers.push(device.create_staging_buffer(&StagingBufferDesc {
            size: plane.size,
            usage: BufferUsage::write_only(),
        })?);
        textures.push(device.create_texture(&TextureDesc {
            width: plane.width,
            height: plane.height,
            channels: plane.channels,
        })?);
    }
    Ok((buffers, textures))
}

#[cfg(test)]
#[path = "write_frame_tests.rs"]
mod tests;
