//! Error types for the reactive runtime.
//!
//! Dependency bookkeeping itself never fails. Errors only surface at the
//! edges: reusing a disposed context, a deferred queue that never settles,
//! a missing async runtime, or a malformed configuration.

use thiserror::Error;

/// Errors produced by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactivityError {
    /// `EffectContext::run` was called on a context that has been disposed.
    #[error("effect context has been disposed and cannot run again")]
    ContextDisposed,

    /// A deferred queue kept producing work after `passes` flush passes.
    ///
    /// This almost always means an effect writes to one of its own
    /// dependencies. The `remaining` tasks are left queued.
    #[error("deferred queue did not settle after {passes} passes ({remaining} tasks still queued)")]
    FlushLimitExceeded { passes: usize, remaining: usize },

    /// `TokioScheduler::current` was called outside of a tokio runtime.
    #[error("no tokio runtime is available on this thread")]
    NoRuntime,

    /// The configuration could not be parsed.
    #[error("invalid reactivity configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactivityError>;
