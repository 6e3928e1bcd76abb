//! Unit tests for texture.rs
//!
//! Format selection from channel counts, descriptor validation and the
//! upload size check.

use crate::error::Error;
use crate::gpu::mock_gpu_device::MockGpuDevice;
use crate::gpu::{
    validate_upload, BufferUsage, GpuDevice, StagingBufferDesc, TextureDesc, TextureFormat,
    TextureInfo,
};

// ============================================================================
// FORMAT
// ============================================================================

#[test]
fn test_format_from_channels() {
    assert_eq!(TextureFormat::from_channels(1).unwrap(), TextureFormat::R8_UNORM);
    assert_eq!(TextureFormat::from_channels(2).unwrap(), TextureFormat::R8G8_UNORM);
    assert_eq!(TextureFormat::from_channels(3).unwrap(), TextureFormat::B8G8R8_UNORM);
    assert_eq!(TextureFormat::from_channels(4).unwrap(), TextureFormat::B8G8R8A8_UNORM);
}

#[test]
fn test_format_rejects_unsupported_channel_counts() {
    assert!(matches!(TextureFormat::from_channels(0), Err(Error::InvalidResource(_))));
    assert!(matches!(TextureFormat::from_channels(5), Err(Error::InvalidResource(_))));
}

#[test]
fn test_format_channels_round_trip() {
    for channels in 1..=4 {
        assert_eq!(TextureFormat::from_channels(channels).unwrap().channels(), channels);
    }
}

// ============================================================================
// DESC / INFO
// ============================================================================

#[test]
fn test_texture_desc_byte_size() {
    let desc = TextureDesc { width: 720, height: 576, channels: 1 };
    assert_eq!(desc.byte_size(), 414_720);
    let desc = TextureDesc { width: 360, height: 288, channels: 2 };
    assert_eq!(desc.byte_size(), 207_360);
}

#[test]
fn test_texture_info_from_desc() {
    let info = TextureInfo::from_desc(&TextureDesc { width: 1920, height: 1080, channels: 4 }).unwrap();
    assert_eq!(info.width, 1920);
    assert_eq!(info.height, 1080);
    assert_eq!(info.format, TextureFormat::B8G8R8A8_UNORM);
    assert_eq!(info.byte_size(), 1920 * 1080 * 4);
}

#[test]
fn test_texture_info_rejects_empty_extent() {
    let result = TextureInfo::from_desc(&TextureDesc { width: 0, height: 16, channels: 1 });
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// UPLOAD VALIDATION
// ============================================================================

#[test]
fn test_validate_upload_size() {
    let mut device = MockGpuDevice::new();
    let info = TextureInfo::from_desc(&TextureDesc { width: 4, height: 4, channels: 2 }).unwrap();

    let exact = device
        .create_staging_buffer(&StagingBufferDesc { size: 32, usage: BufferUsage::write_only() })
        .unwrap();
    assert!(validate_upload(&info, exact.as_ref()).is_ok());

    let larger = device
        .create_staging_buffer(&StagingBufferDesc { size: 64, usage: BufferUsage::write_only() })
        .unwrap();
    assert!(validate_upload(&info, larger.as_ref()).is_ok());

    let short = device
        .create_staging_buffer(&StagingBufferDesc { size: 31, usage: BufferUsage::write_only() })
        .unwrap();
    assert!(matches!(validate_upload(&info, short.as_ref()), Err(Error::InvalidResource(_))));
}
