//! Reactive Primitives
//!
//! This module implements the core reactive system: states, computed states,
//! and effects, plus the dependency-tracking machinery they share.
//!
//! # Concepts
//!
//! ## Observables
//!
//! Every reactive type is an [`Observable`]: it announces reads with
//! `notify_used` and changes with `notify_changed`, and keeps a list of
//! subscriber callbacks.
//!
//! ## States
//!
//! A [`ReactiveState`] is a container for mutable state. When its value is
//! read within an [`EffectContext`], the context registers the state as a
//! dependency. When the value changes, every subscriber is notified.
//!
//! ## Computed States
//!
//! A [`ComputedState`] is a derived value that caches its result. It
//! re-evaluates only when one of its dependencies changed, and only when read.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a side-effecting action that reruns whenever its
//! dependencies change, through a scheduler so that a burst of changes
//! produces one rerun.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically through a thread-local stack of
//! active contexts. When an observable is read, we check whether a context is
//! on top of the stack and, if so, register the dependency there.
//!
//! The graph is rebuilt on every run: each computation gets a fresh context,
//! and the previous one is disposed, so conditional reads never leave stale
//! edges behind.

mod context;
mod effect;
mod memo;
mod observable;
mod owner;
mod signal;
mod subscriber;

pub use context::{untracked, ContextState, EffectContext};
pub use effect::{DisabledScope, ReactiveEffect};
pub use memo::ComputedState;
pub use observable::{Observable, ObservableValue};
pub use owner::{Dispose, Owner};
pub use signal::ReactiveState;
pub use subscriber::{Notifier, ObservableId, Subscription, SubscriptionId};
