//! Process-wide engine settings.
//!
//! All tunables are set once at startup and handed to [`Brain::new`] as an
//! explicit context value — there is no global settings singleton. Hosts that
//! reset a project build a fresh `Brain` with fresh settings.
//!
//! [`Brain::new`]: crate::Brain::new

use crate::cache::StorageMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide configuration, read at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Resident-set policy for the cache / storage bridge.
    pub storage_mode: StorageMode,

    /// Eviction candidates buffered before a flush cycle runs.
    pub eviction_buffer_size: usize,

    /// Maximum age of the oldest buffered candidate before a flush cycle
    /// runs regardless of buffer fill, in milliseconds.
    pub eviction_delay_ms: u64,

    /// General execution slots in the scheduler's thread pool.
    pub max_concurrent_processors: usize,

    /// Slots set aside for resuming blocked/suspended processors, so that
    /// blocking work cannot starve all forward progress.
    pub min_reserved_for_blocked: usize,

    /// When true (the default), removing a link that does not exist or
    /// deleting a neuron that still has links is a hard error. Cleanup
    /// tooling sets this to false to tolerate-and-skip.
    pub error_on_invalid_link_remove: bool,

    /// Log every lock acquisition/release at debug level. Expensive;
    /// meant for diagnosing lock-order bugs during development.
    pub log_locks: bool,
}

impl EngineSettings {
    /// Eviction delay as a [`Duration`].
    pub fn eviction_delay(&self) -> Duration {
        Duration::from_millis(self.eviction_delay_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::StreamWhenPossible,
            eviction_buffer_size: 256,
            eviction_delay_ms: 500,
            max_concurrent_processors: 8,
            min_reserved_for_blocked: 2,
            error_on_invalid_link_remove: true,
            log_locks: false,
        }
    }
}
