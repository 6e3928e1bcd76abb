//! Unit tests for WriteFrame
//!
//! Every frame runs against a MockGpuDevice behind a real GpuQueue; the mock
//! event log shows what happened on the GPU thread and in which order.

use crate::error::Error;
use crate::frame::{CompositeFrame, EmptyFrame, Frame, FrameVisitor, WriteFrame};
use crate::gpu::mock_gpu_device::{MockEvent, MockEventLog, MockGpuDevice};
use crate::gpu::{GpuQueue, Priority, QueueConfig};
use crate::pixel_format::{PixelFormat, PixelFormatDesc, PlaneDesc};
use std::sync::{mpsc, Arc};
use std::time::Duration;

const GPU_THREAD: &str = "frame-gpu";

fn start(device: MockGpuDevice) -> (Arc<GpuQueue>, MockEventLog) {
    let log = device.event_log();
    let config = QueueConfig { thread_name: GPU_THREAD.to_string(), ..QueueConfig::default() };
    (GpuQueue::new(Box::new(device), config).unwrap(), log)
}

fn ycbcr_desc() -> PixelFormatDesc {
    PixelFormatDesc::new(
        PixelFormat::Ycbcr,
        vec![PlaneDesc::new(720, 576, 1), PlaneDesc::new(360, 288, 2)],
    )
}

fn three_plane_desc() -> PixelFormatDesc {
    PixelFormatDesc::new(
        PixelFormat::Ycbcr,
        vec![PlaneDesc::new(4, 4, 1), PlaneDesc::new(2, 2, 1), PlaneDesc::new(2, 2, 1)],
    )
}

/// Texture id of every upload, in upload order
fn uploaded_textures(log: &MockEventLog) -> Vec<u64> {
    log.uploads().into_iter().map(|(texture, _, _)| texture).collect()
}

fn texture_ids(log: &MockEventLog) -> Vec<u64> {
    log.events()
        .into_iter()
        .filter_map(|e| match e {
            MockEvent::CreateTexture { id, .. } => Some(id),
            _ => None,
        })
        .collect()
}

fn position(log: &MockEventLog, event: &MockEvent) -> usize {
    log.events()
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{:?} not recorded", event))
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_new_allocates_one_buffer_and_texture_per_plane() {
    let (queue, log) = start(MockGpuDevice::new());
    let frame = WriteFrame::new(&queue, 42, &ycbcr_desc()).unwrap();

    assert_eq!(frame.tag(), 42);
    assert_eq!(frame.plane_count(), 2);
    assert_eq!(frame.buffers().len(), 2);
    assert_eq!(frame.textures().len(), 2);
    assert_eq!(frame.pixel_format_desc(), &ycbcr_desc());

    for (texture, plane) in frame.textures().iter().zip(&ycbcr_desc().planes) {
        let info = texture.info();
        assert_eq!((info.width, info.height, info.channels), (plane.width, plane.height, plane.channels));
    }
    assert_eq!(
        log.events(),
        vec![
            MockEvent::CreateStagingBuffer { id: 0, size: 414_720 },
            MockEvent::CreateTexture { id: 1, width: 720, height: 576, channels: 1 },
            MockEvent::CreateStagingBuffer { id: 2, size: 207_360 },
            MockEvent::CreateTexture { id: 3, width: 360, height: 288, channels: 2 },
        ]
    );
}

#[test]
fn test_new_allocates_on_gpu_thread() {
    let (queue, log) = start(MockGpuDevice::new());
    let _frame = WriteFrame::new(&queue, 1, &ycbcr_desc()).unwrap();
    assert!(log.records().iter().all(|r| r.thread.as_deref() == Some(GPU_THREAD)));
}

#[test]
fn test_new_with_zero_planes() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 5, &PixelFormatDesc::default()).unwrap();
    assert_eq!(frame.plane_count(), 0);
    assert!(frame.image_data(0).is_empty());
    frame.commit();
    drop(frame);
    assert!(log.events().is_empty());
}

#[test]
fn test_new_out_of_memory_releases_partial_allocation() {
    // Plane 0 (buffer + texture) fits, plane 1's buffer does not
    let (queue, log) = start(MockGpuDevice::new().with_memory_budget(1_000_000));
    let result = WriteFrame::new(&queue, 42, &ycbcr_desc());

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(log.live_count(), 0);
    assert!(log.events().contains(&MockEvent::ReleaseStagingBuffer { id: 0 }));
    assert!(log.events().contains(&MockEvent::ReleaseTexture { id: 1 }));
    assert!(log.records().iter().all(|r| r.thread.as_deref() == Some(GPU_THREAD)));
}

#[test]
fn test_new_rejects_unsupported_channels() {
    let (queue, log) = start(MockGpuDevice::new());
    let desc = PixelFormatDesc::new(PixelFormat::Bgra, vec![PlaneDesc::new(4, 4, 6)]);
    assert!(matches!(WriteFrame::new(&queue, 0, &desc), Err(Error::InvalidResource(_))));
    assert_eq!(log.live_count(), 0);
}

#[test]
fn test_new_after_shutdown_fails() {
    let (queue, _log) = start(MockGpuDevice::new());
    queue.shutdown();
    assert!(matches!(WriteFrame::new(&queue, 0, &ycbcr_desc()), Err(Error::QueueClosed)));
}

// ============================================================================
// IMAGE AND AUDIO ACCESS
// ============================================================================

#[test]
fn test_image_data_has_plane_size() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    assert_eq!(frame.image_data(0).len(), 414_720);
    assert_eq!(frame.image_data(1).len(), 207_360);
    assert_eq!(frame.image_data_mut(1).len(), 207_360);
}

#[test]
fn test_image_data_out_of_range_is_empty() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    assert!(frame.image_data(2).is_empty());
    assert!(frame.image_data_mut(usize::MAX).is_empty());
}

#[test]
fn test_image_data_mut_writes_through() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &three_plane_desc()).unwrap();
    frame.image_data_mut(1).copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(frame.image_data(1), &[1, 2, 3, 4]);
    assert!(frame.image_data(0).iter().all(|&b| b == 0));
}

#[test]
fn test_audio_data_is_independent_of_planes() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &three_plane_desc()).unwrap();
    frame.audio_data_mut().extend_from_slice(&[100, -100, 7]);

    frame.image_data_mut(0).fill(0xAB);
    frame.commit_plane(0);
    frame.commit();
    frame.commit_plane(9);

    assert_eq!(frame.audio_data(), &[100, -100, 7]);
    frame.audio_data_mut().resize(1, 0);
    assert_eq!(frame.audio_data(), &[100]);
}

#[test]
fn test_audio_bytes_are_native_endian() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &PixelFormatDesc::default()).unwrap();
    *frame.audio_data_mut() = vec![0x0102, -1];
    let mut expected = Vec::new();
    expected.extend_from_slice(&0x0102i16.to_ne_bytes());
    expected.extend_from_slice(&(-1i16).to_ne_bytes());
    assert_eq!(frame.audio_bytes(), expected.as_slice());
}

// ============================================================================
// COMMIT
// ============================================================================

#[test]
fn test_commit_plane_empties_only_that_plane() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    frame.commit_plane(0);

    assert!(frame.image_data(0).is_empty());
    assert!(frame.image_data_mut(0).is_empty());
    assert!(frame.is_committed(0));
    assert!(frame.buffers()[0].is_none());

    assert_eq!(frame.image_data(1).len(), 207_360);
    assert!(!frame.is_committed(1));
    assert!(!frame.is_committed(2));
}

#[test]
fn test_commit_uploads_planes_in_order() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 3, &three_plane_desc()).unwrap();
    frame.commit();
    queue.flush().unwrap();

    assert_eq!(uploaded_textures(&log), texture_ids(&log));
    assert!((0..3).all(|plane| frame.is_committed(plane)));
}

#[test]
fn test_double_commit_is_noop() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &three_plane_desc()).unwrap();
    frame.commit_plane(1);
    frame.commit_plane(1);
    frame.commit();
    frame.commit();
    queue.flush().unwrap();
    assert_eq!(log.uploads().len(), 3);
}

#[test]
fn test_commit_out_of_range_is_noop() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &three_plane_desc()).unwrap();
    frame.commit_plane(3);
    queue.flush().unwrap();
    assert!(log.uploads().is_empty());
    assert!(!frame.is_committed(3));
}

#[test]
fn test_commit_returns_before_upload_runs() {
    let (queue, log) = start(MockGpuDevice::new().with_upload_delay(Duration::from_millis(50)));
    let mut frame = WriteFrame::new(&queue, 0, &three_plane_desc()).unwrap();
    frame.commit();
    assert!(log.uploads().len() < 3);
    queue.flush().unwrap();
    assert_eq!(log.uploads().len(), 3);
}

#[test]
fn test_upload_releases_staging_buffer_on_gpu_thread() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    frame.commit_plane(1);
    queue.flush().unwrap();

    let upload = position(&log, &MockEvent::Upload { texture: 3, buffer: 2, bytes: vec![0; 207_360] });
    let release = position(&log, &MockEvent::ReleaseStagingBuffer { id: 2 });
    assert!(upload < release);
    assert!(log.is_live(3));
    assert!(log.records().iter().all(|r| r.thread.as_deref() == Some(GPU_THREAD)));
}

#[test]
fn test_ycbcr_scenario_uploads_written_patterns() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 42, &ycbcr_desc()).unwrap();

    frame.image_data_mut(0).fill(0x10);
    for (i, byte) in frame.image_data_mut(1).iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let chroma: Vec<u8> = frame.image_data(1).to_vec();

    frame.commit();
    assert!(frame.image_data(0).is_empty());
    assert!(frame.image_data(1).is_empty());
    queue.flush().unwrap();

    let uploads = log.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!((uploads[0].0, uploads[0].1), (1, 0));
    assert!(uploads[0].2.iter().all(|&b| b == 0x10));
    assert_eq!((uploads[1].0, uploads[1].1), (3, 2));
    assert_eq!(uploads[1].2, chroma);
    assert_eq!(frame.tag(), 42);
}

// ============================================================================
// DROP
// ============================================================================

#[test]
fn test_drop_releases_everything_on_gpu_thread() {
    let (queue, log) = start(MockGpuDevice::new());
    let frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    drop(frame);

    assert_eq!(log.live_count(), 0);
    assert!(log.records().iter().all(|r| r.thread.as_deref() == Some(GPU_THREAD)));
}

#[test]
fn test_drop_keeps_texture_alive_for_pending_upload() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();

    // Park the GPU thread so the upload is still queued when the frame goes away
    let (release, gate) = mpsc::channel::<()>();
    let (parked_tx, parked_rx) = mpsc::channel::<()>();
    queue.begin_invoke(Priority::Normal, move |_| {
        parked_tx.send(()).ok();
        gate.recv().ok();
        Ok(())
    });
    parked_rx.recv().unwrap();

    frame.commit_plane(0);
    let dropper = std::thread::spawn(move || drop(frame));
    while queue.stats().pending < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }
    release.send(()).unwrap();
    dropper.join().unwrap();
    queue.flush().unwrap();

    // Teardown (high) ran before the upload (normal): plane 1 went first,
    // plane 0's texture outlived the frame until its upload finished
    let released_buffer_1 = position(&log, &MockEvent::ReleaseStagingBuffer { id: 2 });
    let released_texture_1 = position(&log, &MockEvent::ReleaseTexture { id: 3 });
    let upload_0 = position(&log, &MockEvent::Upload { texture: 1, buffer: 0, bytes: vec![0; 414_720] });
    let released_texture_0 = position(&log, &MockEvent::ReleaseTexture { id: 1 });
    assert!(released_buffer_1 < upload_0);
    assert!(released_texture_1 < upload_0);
    assert!(upload_0 < released_texture_0);
    assert_eq!(log.live_count(), 0);
}

#[test]
fn test_drop_on_gpu_thread_releases_inline() {
    let (queue, log) = start(MockGpuDevice::new());
    let frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    queue.begin_invoke(Priority::Normal, move |_| {
        drop(frame);
        Ok(())
    });
    queue.flush().unwrap();

    assert_eq!(log.live_count(), 0);
    assert_eq!(queue.stats().failed, 0);
}

#[test]
fn test_drop_after_shutdown_releases_on_dropping_thread() {
    let (queue, log) = start(MockGpuDevice::new());
    let frame = WriteFrame::new(&queue, 0, &ycbcr_desc()).unwrap();
    queue.shutdown();
    log.clear();
    drop(frame);

    assert_eq!(log.live_count(), 0);
    assert_eq!(log.records().len(), 4);
    assert!(log.records().iter().all(|r| r.thread.as_deref() != Some(GPU_THREAD)));
}

// ============================================================================
// VISITOR
// ============================================================================

#[derive(Default)]
struct RecordingVisitor {
    calls: Vec<String>,
}

impl FrameVisitor for RecordingVisitor {
    fn begin(&mut self, frame: &dyn Frame) {
        self.calls.push(format!("begin {}", frame.tag()));
    }

    fn visit(&mut self, frame: &mut WriteFrame) {
        self.calls.push(format!("visit {}", frame.tag()));
        frame.commit();
    }

    fn end(&mut self) {
        self.calls.push("end".to_string());
    }
}

#[test]
fn test_write_frame_accept_sequence() {
    let (queue, log) = start(MockGpuDevice::new());
    let mut frame = WriteFrame::new(&queue, 42, &ycbcr_desc()).unwrap();
    let mut visitor = RecordingVisitor::default();
    frame.accept(&mut visitor);

    assert_eq!(visitor.calls, vec!["begin 42", "visit 42", "end"]);
    assert!(frame.is_committed(0) && frame.is_committed(1));
    queue.flush().unwrap();
    assert_eq!(log.uploads().len(), 2);
}

#[test]
fn test_empty_frame_accept_sequence() {
    let mut frame = EmptyFrame::new(8);
    let mut visitor = RecordingVisitor::default();
    frame.accept(&mut visitor);
    assert_eq!(visitor.calls, vec!["begin 8", "end"]);
}

#[test]
fn test_composite_frame_accepts_children_in_order() {
    let (queue, _log) = start(MockGpuDevice::new());
    let mut composite = CompositeFrame::new(7);
    composite.push(Box::new(WriteFrame::new(&queue, 1, &three_plane_desc()).unwrap()));
    composite.push(Box::new(EmptyFrame::new(2)));
    composite.push(Box::new(CompositeFrame::with_frames(3, vec![Box::new(EmptyFrame::new(4))])));

    let mut visitor = RecordingVisitor::default();
    composite.accept(&mut visitor);

    assert_eq!(
        visitor.calls,
        vec![
            "begin 7", "begin 1", "visit 1", "end", "begin 2", "end", "begin 3", "begin 4", "end",
            "end", "end",
        ]
    );
    assert_eq!(composite.tag(), 7);
    assert_eq!(composite.len(), 3);
    assert_eq!(composite.frames()[1].tag(), 2);
}

#[test]
fn test_frames_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<WriteFrame>();
    assert_send::<EmptyFrame>();
    assert_send::<CompositeFrame>();
}
