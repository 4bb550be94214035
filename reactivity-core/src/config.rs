//! Runtime Configuration
//!
//! Tunables for the deferred queue and effect lifecycle. Hosts usually keep
//! these next to their own settings and load them from JSON.
//!
//! ```rust
//! use reactivity_core::ReactivityConfig;
//!
//! let config = ReactivityConfig::from_json_str(r#"{ "max_flush_passes": 8 }"#).unwrap();
//! assert_eq!(config.max_flush_passes, 8);
//! assert!(!config.auto_dispose_unobserved_effects);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default number of passes a `DeferredQueue` flush may take.
pub const DEFAULT_MAX_FLUSH_PASSES: usize = 64;

/// Configuration for the reactive runtime.
///
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactivityConfig {
    /// Upper bound on flush passes before `DeferredQueue::flush` gives up.
    ///
    /// Each pass runs every task that was queued when the pass started.
    /// Tasks queued during a pass run in the next one.
    pub max_flush_passes: usize,

    /// Dispose an effect whose run finished without reading any observable.
    ///
    /// Such an effect can never be triggered again, so keeping it alive only
    /// holds on to its closure.
    pub auto_dispose_unobserved_effects: bool,
}

impl Default for ReactivityConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: DEFAULT_MAX_FLUSH_PASSES,
            auto_dispose_unobserved_effects: false,
        }
    }
}

impl ReactivityConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
