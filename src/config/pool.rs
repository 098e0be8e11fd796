//! Pool sizing configuration, serializable for loading from a config file
//! or environment.

use serde::{Deserialize, Serialize};

use crate::core::pool::PoolConfig;

/// Serializable counterpart of [`crate::core::pool::PoolConfig`]. Kept
/// separate so the hot-path struct stays free of `serde` derives; convert
/// with [`Self::into_pool_config`] once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolProfileConfig {
    /// Threads kept alive even when idle.
    pub core_threads: usize,
    /// Ceiling on total worker threads.
    pub max_threads: usize,
    /// Seconds a non-core worker waits for work before exiting.
    pub idle_ttl_secs: u64,
    /// Backlog capacity for a bounded pool.
    pub queue_capacity: usize,
}

impl Default for PoolProfileConfig {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            core_threads: defaults.core_threads,
            max_threads: defaults.max_threads,
            idle_ttl_secs: defaults.idle_ttl.as_secs(),
            queue_capacity: defaults.queue_capacity,
        }
    }
}

impl PoolProfileConfig {
    /// Validate field values before building a pool from this profile.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_threads == 0 {
            return Err("max_threads must be greater than 0".into());
        }
        if self.core_threads > self.max_threads {
            return Err("core_threads must not exceed max_threads".into());
        }
        if self.idle_ttl_secs == 0 {
            return Err("idle_ttl_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Convert to the runtime [`PoolConfig`] the pool factory consumes.
    #[must_use]
    pub fn into_pool_config(self) -> PoolConfig {
        PoolConfig {
            core_threads: self.core_threads,
            max_threads: self.max_threads,
            idle_ttl: std::time::Duration::from_secs(self.idle_ttl_secs),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Root configuration for the framework's pools: the eagerly-created cached
/// pool, and the profile used to lazily build every named pool
/// [`crate::core::machine::ThreadMachine::execute_in_thread`] resolves via
/// `poolName`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Sizing applied to every pool lazily created for a `poolName` passed
    /// to [`crate::api::thread_runnable`].
    pub default_pool: PoolProfileConfig,
    /// Sizing for the cached pool backing [`crate::api::with_timeout`] and
    /// non-poolable [`crate::api::thread_runnable`] dispatches.
    pub cached: PoolProfileConfig,
}

impl FrameworkConfig {
    /// Validate both profiles.
    pub fn validate(&self) -> Result<(), String> {
        self.default_pool
            .validate()
            .map_err(|e| format!("default_pool: {e}"))?;
        self.cached.validate().map_err(|e| format!("cached: {e}"))?;
        Ok(())
    }

    /// Parse from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
