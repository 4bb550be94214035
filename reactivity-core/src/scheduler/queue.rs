//! Host-flushed deferred queue.
//!
//! Tasks accumulate until the host calls [`DeferredQueue::flush`], usually
//! once per frame. Flushing runs in passes: each pass drains whatever was
//! queued when it started, and tasks deferred by those tasks wait for the
//! next pass. A queue that is still non-empty after the configured number of
//! passes is reported as an error instead of spinning forever.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{DeferredTask, Scheduler};
use crate::config::ReactivityConfig;
use crate::error::{ReactivityError, Result};

struct QueueInner {
    tasks: Mutex<VecDeque<DeferredTask>>,
    max_flush_passes: usize,
}

/// FIFO of deferred tasks, flushed by the host.
///
/// Cloning produces another handle to the same queue.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use reactivity_core::{DeferredQueue, ReactiveEffect, ReactiveState};
///
/// let queue = DeferredQueue::new();
/// let health = ReactiveState::new(100);
///
/// let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
///     let health = health.clone();
///     move || println!("health: {}", health.read())
/// });
///
/// health.write(90);
/// health.write(80);
/// assert_eq!(effect.run_count(), 1);
///
/// // End of frame: the effect reruns once, seeing 80.
/// queue.flush().unwrap();
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct DeferredQueue {
    inner: Arc<QueueInner>,
}

impl DeferredQueue {
    /// Create a queue with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&ReactivityConfig::default())
    }

    /// Create a queue using `config.max_flush_passes`.
    pub fn with_config(config: &ReactivityConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                tasks: Mutex::new(VecDeque::new()),
                max_flush_passes: config.max_flush_passes.max(1),
            }),
        }
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Run queued tasks until the queue is empty.
    ///
    /// Returns how many tasks ran. Fails with
    /// [`ReactivityError::FlushLimitExceeded`] if tasks keep deferring new
    /// tasks for more than the configured number of passes; whatever is
    /// still queued stays queued. If a task panics, the tasks after it in the
    /// same pass are put back at the front of the queue.
    pub fn flush(&self) -> Result<usize> {
        let max_passes = self.inner.max_flush_passes;
        let mut executed = 0;

        for pass in 0..max_passes {
            let batch = std::mem::take(&mut *self.inner.tasks.lock());
            if batch.is_empty() {
                tracing::debug!(passes = pass, executed, "deferred queue flushed");
                return Ok(executed);
            }

            let mut batch = Requeue {
                queue: &self.inner,
                batch,
            };
            while let Some(task) = batch.batch.pop_front() {
                task();
                executed += 1;
            }
        }

        let remaining = self.pending();
        if remaining == 0 {
            tracing::debug!(passes = max_passes, executed, "deferred queue flushed");
            return Ok(executed);
        }

        tracing::warn!(
            passes = max_passes,
            remaining,
            "deferred queue did not settle; an effect is probably invalidating itself"
        );
        Err(ReactivityError::FlushLimitExceeded {
            passes: max_passes,
            remaining,
        })
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DeferredQueue {
    fn defer(&self, task: DeferredTask) {
        let mut tasks = self.inner.tasks.lock();
        tasks.push_back(task);
        tracing::trace!(pending = tasks.len(), "task deferred");
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.pending())
            .field("max_flush_passes", &self.inner.max_flush_passes)
            .finish()
    }
}

/// Puts unexecuted tasks back if a pass unwinds.
struct Requeue<'a> {
    queue: &'a QueueInner,
    batch: VecDeque<DeferredTask>,
}

impl Drop for Requeue<'_> {
    fn drop(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let mut tasks = self.queue.tasks.lock();
        while let Some(task) = self.batch.pop_back() {
            tasks.push_front(task);
        }
    }
}
