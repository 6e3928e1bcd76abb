/// GpuQueue - the single GPU-context thread
///
/// Every operation that touches GPU resources (allocation, upload, release)
/// runs on one dedicated worker thread that exclusively owns the
/// [`GpuDevice`]. Other threads talk to it by submitting tasks:
///
/// - [`GpuQueue::invoke`]: blocking round-trip, returns the task's result
/// - [`GpuQueue::begin_invoke`]: fire-and-forget, failures are logged here
///
/// Tasks carry a [`Priority`]. The worker always drains the high lane before
/// the normal lane; within a lane tasks run in submission order.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::gpu::GpuDevice;
use crate::{mixer_err, mixer_error, mixer_info, mixer_trace, mixer_warn};

const SOURCE: &str = "mixer::GpuQueue";

/// Scheduling tier of a GPU task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Frame allocation and teardown
    High,
    /// Uploads, FIFO with other normal work
    Normal,
}

/// GPU queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Name of the worker thread
    pub thread_name: String,
    /// Tasks running longer than this are logged as warnings
    pub slow_task_threshold: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            thread_name: "mixer-gpu".to_string(),
            slow_task_threshold: Some(Duration::from_millis(10)),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// High priority tasks run so far
    pub executed_high: u64,
    /// Normal priority tasks run so far
    pub executed_normal: u64,
    /// Tasks that returned an error or panicked
    pub failed: u64,
    /// Tasks waiting in either lane
    pub pending: usize,
}

type Task = Box<dyn FnOnce(&mut dyn GpuDevice) -> Result<()> + Send + 'static>;

struct QueueState {
    high: VecDeque<Task>,
    normal: VecDeque<Task>,
    closed: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    available: Condvar,
    executed_high: AtomicU64,
    executed_normal: AtomicU64,
    failed: AtomicU64,
}

impl QueueShared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Tasks never run under this lock, a poisoned guard still holds consistent lanes
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, priority: Priority, task: Task) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::QueueClosed);
        }
        match priority {
            Priority::High => state.high.push_back(task),
            Priority::Normal => state.normal.push_back(task),
        }
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Next task to run, or None once the queue is closed and drained
    fn next_task(&self) -> Option<(Priority, Task)> {
        let mut state = self.lock();
        loop {
            if let Some(task) = state.high.pop_front() {
                return Some((Priority::High, task));
            }
            if let Some(task) = state.normal.pop_front() {
                return Some((Priority::Normal, task));
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Handle to the GPU thread
///
/// Shared through `Arc` by every frame that owns GPU resources.
pub struct GpuQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    thread_name: String,
}

impl GpuQueue {
    /// Spawn the GPU thread and hand it `device`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the thread cannot be spawned.
    pub fn new(device: Box<dyn GpuDevice>, config: QueueConfig) -> Result<Arc<Self>> {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                high: VecDeque::new(),
                normal: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            executed_high: AtomicU64::new(0),
            executed_normal: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let threshold = config.slow_task_threshold;
        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(worker_shared, device, threshold))
            .map_err(|e| {
                mixer_error!(SOURCE, "Failed to spawn GPU thread '{}': {}", config.thread_name, e);
                Error::InitializationFailed(format!("Failed to spawn GPU thread: {}", e))
            })?;

        let worker_id = worker.thread().id();
        mixer_info!(SOURCE, "GPU thread '{}' started", config.thread_name);

        Ok(Arc::new(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            worker_id,
            thread_name: config.thread_name,
        }))
    }

    /// Run `f` on the GPU thread and wait for its result
    ///
    /// # Errors
    ///
    /// - `Error::QueueClosed` after [`GpuQueue::shutdown`]
    /// - `Error::BackendError` when called from the GPU thread itself
    ///   (the round-trip would deadlock) or when `f` panics
    pub fn invoke<F, R>(&self, priority: Priority, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GpuDevice) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_gpu_thread() {
            return Err(mixer_err!(SOURCE, "Blocking invoke issued from the GPU thread would deadlock"));
        }

        let (sender, receiver) = mpsc::sync_channel(1);
        self.shared.push(
            priority,
            Box::new(move |device| {
                // The caller may have stopped waiting, nothing to report then
                let _ = sender.send(f(device));
                Ok(())
            }),
        )?;

        receiver
            .recv()
            .map_err(|_| mixer_err!(SOURCE, "GPU task ended without producing a result"))
    }

    /// Queue `f` on the GPU thread and return immediately
    ///
    /// An `Err` returned by `f`, or a panic, is logged on the GPU thread.
    /// After shutdown the task is dropped on the calling thread.
    pub fn begin_invoke<F>(&self, priority: Priority, f: F)
    where
        F: FnOnce(&mut dyn GpuDevice) -> Result<()> + Send + 'static,
    {
        if let Err(e) = self.shared.push(priority, Box::new(f)) {
            mixer_warn!(SOURCE, "Dropping {:?} priority GPU task: {}", priority, e);
        }
    }

    /// Wait until every normal priority task submitted before this call has run
    pub fn flush(&self) -> Result<()> {
        self.invoke(Priority::Normal, |_| ())
    }

    /// Whether the calling thread is the GPU thread
    pub fn is_gpu_thread(&self) -> bool {
        std::thread::current().id() == self.worker_id
    }

    /// Name of the GPU thread
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Execution counters
    pub fn stats(&self) -> QueueStats {
        let pending = {
            let state = self.shared.lock();
            state.high.len() + state.normal.len()
        };
        QueueStats {
            executed_high: self.shared.executed_high.load(Ordering::Relaxed),
            executed_normal: self.shared.executed_normal.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            pending,
        }
    }

    /// Stop accepting work, let the GPU thread drain what is queued, then join it
    ///
    /// Idempotent. Called from the GPU thread it only closes the queue.
    pub fn shutdown(&self) {
        let newly_closed = {
            let mut state = self.shared.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        self.shared.available.notify_all();

        if self.is_gpu_thread() {
            return;
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                mixer_error!(SOURCE, "GPU thread '{}' terminated abnormally", self.thread_name);
            }
        }
        if newly_closed {
            mixer_info!(SOURCE, "GPU thread '{}' shut down", self.thread_name);
        }
    }
}

impl Drop for GpuQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<QueueShared>, mut device: Box<dyn GpuDevice>, threshold: Option<Duration>) {
    while let Some((priority, task)) = shared.next_task() {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(device.as_mut())));

        match priority {
            Priority::High => shared.executed_high.fetch_add(1, Ordering::Relaxed),
            Priority::Normal => shared.executed_normal.fetch_add(1, Ordering::Relaxed),
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                mixer_error!(SOURCE, "{:?} priority GPU task failed: {}", priority, e);
            }
            Err(_) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                mixer_error!(SOURCE, "{:?} priority GPU task panicked", priority);
            }
        }

        let elapsed = started.elapsed();
        match threshold {
            Some(limit) if elapsed > limit => {
                mixer_warn!(SOURCE, "{:?} priority GPU task took {:.2} ms", priority, elapsed.as_secs_f64() * 1000.0);
            }
            _ => mixer_trace!(SOURCE, "{:?} priority GPU task done in {:?}", priority, elapsed),
        }
    }

    if let Err(e) = device.wait_idle() {
        mixer_error!(SOURCE, "wait_idle failed while stopping the GPU thread: {}", e);
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
