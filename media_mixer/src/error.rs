//! Error types for the media mixer
//!
//! This module defines the error types used throughout the mixer,
//! including GPU resource allocation, uploads and queue lifetime.

use std::fmt;

/// Result type for mixer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mixer errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, GPU thread, etc.)
    BackendError(String),

    /// Out of GPU memory (staging buffer or texture allocation failed)
    OutOfMemory,

    /// Invalid resource or resource description (texture geometry, buffer size, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, device, GPU thread)
    InitializationFailed(String),

    /// The GPU queue has been shut down and no longer accepts work
    QueueClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::QueueClosed => write!(f, "GPU queue is closed"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
