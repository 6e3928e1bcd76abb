/// Mock GPU device (no GPU required)
///
/// Heap-backed staging buffers and textures for unit tests, integration tests
/// and headless runs. Every allocation, upload and release is recorded in a
/// shared [`MockEventLog`] together with the name of the thread it happened on,
/// so tests can check both ordering and GPU-thread affinity.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::gpu::{
    validate_upload, BufferUsage, DeviceStats, GpuDevice, StagingBuffer, StagingBufferDesc,
    Texture, TextureDesc, TextureInfo,
};

// ============================================================================
// Events
// ============================================================================

/// One observable action of the mock device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    CreateStagingBuffer { id: u64, size: usize },
    CreateTexture { id: u64, width: u32, height: u32, channels: u32 },
    Upload { texture: u64, buffer: u64, bytes: Vec<u8> },
    ReleaseStagingBuffer { id: u64 },
    ReleaseTexture { id: u64 },
}

/// An event and the thread it happened on
#[derive(Debug, Clone)]
pub struct MockRecord {
    pub event: MockEvent,
    pub thread: Option<String>,
}

struct MockShared {
    records: Mutex<Vec<MockRecord>>,
    /// Live allocation sizes by resource id
    live: Mutex<FxHashMap<u64, usize>>,
    stats: Mutex<DeviceStats>,
}

impl MockShared {
    fn record(&self, event: MockEvent) {
        let thread = std::thread::current().name().map(str::to_string);
        if let Ok(mut records) = self.records.lock() {
            records.push(MockRecord { event, thread });
        }
    }

    fn release(&self, id: u64, event: MockEvent) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&id);
        }
        self.record(event);
    }
}

/// Shared view of everything a [`MockGpuDevice`] did
///
/// Cloned out of the device before the device is moved into a queue.
#[derive(Clone)]
pub struct MockEventLog {
    shared: Arc<MockShared>,
}

impl MockEventLog {
    /// All records in the order they happened
    pub fn records(&self) -> Vec<MockRecord> {
        self.shared.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// All events in the order they happened
    pub fn events(&self) -> Vec<MockEvent> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    /// Upload events as `(texture id, buffer id, bytes)`
    pub fn uploads(&self) -> Vec<(u64, u64, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Upload { texture, buffer, bytes } => Some((texture, buffer, bytes)),
                _ => None,
            })
            .collect()
    }

    /// Number of staging buffers and textures not yet released
    pub fn live_count(&self) -> usize {
        self.shared.live.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Bytes held by live staging buffers and textures
    pub fn live_bytes(&self) -> usize {
        self.shared.live.lock().map(|l| l.values().sum()).unwrap_or(0)
    }

    /// Whether a resource id is still alive
    pub fn is_live(&self, id: u64) -> bool {
        self.shared.live.lock().map(|l| l.contains_key(&id)).unwrap_or(false)
    }

    /// Device counters
    pub fn stats(&self) -> DeviceStats {
        self.shared.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Forget recorded events (live allocations are kept)
    pub fn clear(&self) {
        if let Ok(mut records) = self.shared.records.lock() {
            records.clear();
        }
    }
}

// ============================================================================
// Mock StagingBuffer
// ============================================================================

pub struct MockStagingBuffer {
    pub id: u64,
    data: Vec<u8>,
    usage: BufferUsage,
    shared: Arc<MockShared>,
}

impl StagingBuffer for MockStagingBuffer {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockStagingBuffer {
    fn drop(&mut self) {
        self.shared.release(self.id, MockEvent::ReleaseStagingBuffer { id: self.id });
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub id: u64,
    info: TextureInfo,
    upload_delay: Option<Duration>,
    shared: Arc<MockShared>,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn read(&self, buffer: &dyn StagingBuffer) -> Result<()> {
        validate_upload(&self.info, buffer)?;
        let buffer_id = buffer
            .as_any()
            .downcast_ref::<MockStagingBuffer>()
            .map(|b| b.id)
            .ok_or_else(|| Error::InvalidResource("Not a mock staging buffer".to_string()))?;

        if let Some(delay) = self.upload_delay {
            std::thread::sleep(delay);
        }

        let bytes = buffer.as_slice()[..self.info.byte_size()].to_vec();
        if let Ok(mut stats) = self.shared.stats.lock() {
            stats.uploads += 1;
            stats.bytes_uploaded += bytes.len() as u64;
        }
        self.shared.record(MockEvent::Upload { texture: self.id, buffer: buffer_id, bytes });
        Ok(())
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        self.shared.release(self.id, MockEvent::ReleaseTexture { id: self.id });
    }
}

// ============================================================================
// Mock GpuDevice
// ============================================================================

pub struct MockGpuDevice {
    shared: Arc<MockShared>,
    next_id: u64,
    memory_budget: Option<usize>,
    upload_delay: Option<Duration>,
}

impl MockGpuDevice {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                records: Mutex::new(Vec::new()),
                live: Mutex::new(FxHashMap::default()),
                stats: Mutex::new(DeviceStats::default()),
            }),
            next_id: 0,
            memory_budget: None,
            upload_delay: None,
        }
    }

    /// Fail allocations with `Error::OutOfMemory` once live bytes would exceed `bytes`
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Make every texture upload sleep for `delay` on the GPU thread
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Handle on the event log, valid after the device has been moved away
    pub fn event_log(&self) -> MockEventLog {
        MockEventLog { shared: Arc::clone(&self.shared) }
    }

    /// Reserve `size` bytes under a fresh id, honouring the memory budget
    fn reserve(&mut self, size: usize) -> Result<u64> {
        let mut live = self
            .shared
            .live
            .lock()
            .map_err(|_| Error::BackendError("Mock allocation table poisoned".to_string()))?;
        if let Some(budget) = self.memory_budget {
            let used: usize = live.values().sum();
            if used + size > budget {
                return Err(Error::OutOfMemory);
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        live.insert(id, size);
        Ok(id)
    }
}

impl Default for MockGpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for MockGpuDevice {
    fn create_staging_buffer(&mut self, desc: &StagingBufferDesc) -> Result<Box<dyn StagingBuffer>> {
        let id = self.reserve(desc.size)?;
        if let Ok(mut stats) = self.shared.stats.lock() {
            stats.staging_buffers_created += 1;
        }
        self.shared.record(MockEvent::CreateStagingBuffer { id, size: desc.size });
        Ok(Box::new(MockStagingBuffer {
            id,
            data: vec![0; desc.size],
            usage: desc.usage,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        let info = TextureInfo::from_desc(desc)?;
        let id = self.reserve(info.byte_size())?;
        if let Ok(mut stats) = self.shared.stats.lock() {
            stats.textures_created += 1;
        }
        self.shared.record(MockEvent::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
            channels: desc.channels,
        });
        Ok(Arc::new(MockTexture {
            id,
            info,
            upload_delay: self.upload_delay,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn wait_idle(&mut self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        self.shared.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "mock_gpu_device_tests.rs"]
mod tests;
