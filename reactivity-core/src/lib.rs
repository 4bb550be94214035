//! Reactivity Core
//!
//! This crate provides fine-grained reactive dependency tracking for
//! game-state and UI code. It implements:
//!
//! - Reactive primitives (states, computed states, effects)
//! - Automatic, per-run dependency discovery through effect contexts
//! - Deferred effect scheduling with per-frame batching
//! - Reactive list, map and set containers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `scheduler`: Deferred execution of effect reruns
//! - `collections`: Observable containers with single-notification mutations
//! - `config`: Runtime tunables
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use reactivity_core::{ComputedState, DeferredQueue, ReactiveEffect, ReactiveState};
//!
//! let queue = DeferredQueue::new();
//!
//! // Create a state
//! let count = ReactiveState::new(0);
//!
//! // Create a derived value
//! let doubled = ComputedState::new({
//!     let count = count.clone();
//!     move || count.read() * 2
//! });
//!
//! // Create an effect
//! let effect = ReactiveEffect::new(Arc::new(queue.clone()), {
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     move || println!("Count: {}, Doubled: {}", count.read(), doubled.read())
//! });
//!
//! // Update the state
//! count.write(5);
//!
//! // At the end of the frame, the effect reruns and prints:
//! // "Count: 5, Doubled: 10"
//! queue.flush().unwrap();
//! assert_eq!(effect.run_count(), 2);
//! ```

pub mod collections;
pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use collections::{ListSnapshot, MapSnapshot, ReactiveList, ReactiveMap, ReactiveSet, SetSnapshot};
pub use config::ReactivityConfig;
pub use error::{ReactivityError, Result};
pub use reactive::{
    untracked, ComputedState, ContextState, DisabledScope, Dispose, EffectContext, Observable,
    ObservableValue, Owner, ReactiveEffect, ReactiveState,
};
pub use scheduler::{DeferredQueue, DeferredTask, ImmediateScheduler, Scheduler, TokioScheduler};
