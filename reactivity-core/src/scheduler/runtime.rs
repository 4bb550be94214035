//! Tokio-backed scheduler.

use std::fmt;

use tokio::runtime::Handle;

use super::{DeferredTask, Scheduler};
use crate::error::{ReactivityError, Result};

/// Spawns each deferred task on a tokio runtime.
///
/// Tasks run on whichever worker picks them up. Each worker thread has its
/// own context stack, so a rerun tracks its reads independently of the
/// thread that scheduled it.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| ReactivityError::NoRuntime)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: DeferredTask) {
        self.handle.spawn(async move { task() });
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn current_fails_outside_a_runtime() {
        assert!(matches!(
            TokioScheduler::current(),
            Err(ReactivityError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn spawns_deferred_tasks() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let ran = Arc::new(AtomicI32::new(0));
        let ran_clone = ran.clone();

        scheduler.defer(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        }));

        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("task did not run")
            .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
