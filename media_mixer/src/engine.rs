/// Mixer Engine - process-wide singletons
///
/// Holds the active logger used by every `mixer_*!` macro and an optional
/// shared [`GpuQueue`]. Storage is a `OnceLock` plus `RwLock`, so the engine
/// can be reached from producer threads and from the GPU thread alike.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;
use crate::error::{Error, Result};
use crate::gpu::{GpuDevice, GpuQueue, QueueConfig};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

const SOURCE: &str = "mixer::Engine";

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

struct EngineState {
    gpu_queue: RwLock<Option<Arc<GpuQueue>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            gpu_queue: RwLock::new(None),
        }
    }
}

fn active_logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// # Example
///
/// ```no_run
/// use media_mixer::mixer::{Engine, QueueConfig};
/// use media_mixer::mixer::gpu::mock_gpu_device::MockGpuDevice;
///
/// Engine::initialize()?;
/// let queue = Engine::create_gpu_queue(MockGpuDevice::new(), QueueConfig::default())?;
/// // ... create frames on `queue` ...
/// Engine::shutdown();
/// # Ok::<(), media_mixer::mixer::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log an error before handing it back to the caller
    fn log_and_return_error(error: Error) -> Error {
        crate::mixer_error!(SOURCE, "{}", error);
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "Engine not initialized. Call Engine::initialize() first.".to_string(),
            ))
        })
    }

    /// Initialize the engine
    ///
    /// Idempotent. Must be called before any `*_gpu_queue` function.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Destroy every singleton
    ///
    /// The GPU queue is shut down (pending uploads run first). Frames that
    /// still hold the queue release their resources on their own thread.
    pub fn shutdown() {
        let queue = ENGINE_STATE
            .get()
            .and_then(|state| state.gpu_queue.write().ok())
            .and_then(|mut lock| lock.take());
        if let Some(queue) = queue {
            queue.shutdown();
            crate::mixer_info!(SOURCE, "GPU queue singleton destroyed");
        }
    }

    // ===== GPU QUEUE API =====

    /// Start a GPU thread owning `device` and register it as the shared queue
    ///
    /// # Errors
    ///
    /// - `Error::InitializationFailed` if the engine is not initialized or a
    ///   queue already exists
    /// - any error from [`GpuQueue::new`]
    pub fn create_gpu_queue<D: GpuDevice + 'static>(device: D, config: QueueConfig) -> Result<Arc<GpuQueue>> {
        let state = Self::state()?;

        let mut lock = state.gpu_queue.write().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("GPU queue lock poisoned".to_string()))
        })?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "GPU queue already exists. Call Engine::destroy_gpu_queue() first.".to_string(),
            )));
        }

        let queue = GpuQueue::new(Box::new(device), config)?;
        *lock = Some(Arc::clone(&queue));

        crate::mixer_info!(SOURCE, "GPU queue singleton created on thread '{}'", queue.thread_name());
        Ok(queue)
    }

    /// Get the shared GPU queue
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the engine is not initialized or no
    /// queue has been created.
    pub fn gpu_queue() -> Result<Arc<GpuQueue>> {
        let state = Self::state()?;

        let lock = state.gpu_queue.read().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("GPU queue lock poisoned".to_string()))
        })?;

        lock.clone().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "GPU queue not created. Call Engine::create_gpu_queue() first.".to_string(),
            ))
        })
    }

    /// Unregister and shut down the shared GPU queue
    ///
    /// Idempotent. Existing `Arc<GpuQueue>` handles stay valid but are closed.
    pub fn destroy_gpu_queue() -> Result<()> {
        let state = Self::state()?;

        let queue = state
            .gpu_queue
            .write()
            .map_err(|_| {
                Self::log_and_return_error(Error::BackendError("GPU queue lock poisoned".to_string()))
            })?
            .take();

        if let Some(queue) = queue {
            queue.shutdown();
            crate::mixer_info!(SOURCE, "GPU queue singleton destroyed");
        }
        Ok(())
    }

    /// Reset all singletons for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        Self::shutdown();
        Self::reset_logger();
    }

    // ===== LOGGING API =====

    /// Replace the active logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use media_mixer::mixer::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct Silent;
    /// impl Logger for Silent {
    ///     fn log(&self, _entry: &LogEntry) {}
    /// }
    ///
    /// Engine::set_logger(Silent);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = active_logger().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = active_logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Logging entry point of `mixer_trace!` .. `mixer_warn!`
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = active_logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Logging entry point of `mixer_error!`, carries file:line
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = active_logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
