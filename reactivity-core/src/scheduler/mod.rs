//! Deferred Scheduling
//!
//! Effects never rerun inside the notification that invalidated them.
//! Instead they hand a task to a [`Scheduler`], the host's "run this later"
//! capability, so several invalidations in one call stack collapse into one
//! rerun.
//!
//! The crate ships three schedulers:
//!
//! - [`DeferredQueue`]: a FIFO the host flushes at a point of its choosing,
//!   typically the end of a frame or tick.
//! - [`ImmediateScheduler`]: runs tasks synchronously.
//! - [`TokioScheduler`]: spawns tasks on a tokio runtime.
//!
//! Any `Fn(DeferredTask) + Send + Sync` closure is a scheduler as well, so a
//! host can plug in its own loop directly.

mod queue;
mod runtime;

pub use queue::DeferredQueue;
pub use runtime::TokioScheduler;

/// A unit of deferred work.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Accepts a task and runs it once, later.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run at the next convenient point.
    fn defer(&self, task: DeferredTask);
}

impl<F> Scheduler for F
where
    F: Fn(DeferredTask) + Send + Sync,
{
    fn defer(&self, task: DeferredTask) {
        self(task);
    }
}

/// Runs every task as soon as it is deferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn defer(&self, task: DeferredTask) {
        task();
    }
}
