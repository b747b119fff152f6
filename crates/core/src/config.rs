use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FrameQueueError;

/// Upper bound on configured worker threads. Anything above this is a typo.
const MAX_WORKER_THREADS: usize = 256;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

/// Work queue configuration, parsed from TOML and/or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkQueueConfig {
    /// Number of worker threads. 0 = available parallelism minus the main thread.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// When false no worker threads are created and all work runs in the frame hook.
    #[serde(default = "default_threads_enabled")]
    pub threads_enabled: bool,
    /// Per-frame budget for executing items on the main thread when there are no workers.
    #[serde(default = "default_non_threaded_work_ms")]
    pub non_threaded_work_ms: u64,
    /// How far the free list must shrink between purges before it is trimmed.
    #[serde(default = "default_pool_tolerance")]
    pub pool_tolerance: usize,
}

fn default_worker_threads() -> usize { 0 }
fn default_threads_enabled() -> bool { true }
fn default_non_threaded_work_ms() -> u64 { 5 }
fn default_pool_tolerance() -> usize { 10 }

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            threads_enabled: default_threads_enabled(),
            non_threaded_work_ms: default_non_threaded_work_ms(),
            pool_tolerance: default_pool_tolerance(),
        }
    }
}

impl WorkQueueConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FRAMEQUEUE_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("FRAMEQUEUE_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(&profile.to_uppercase());
        config
    }

    /// Parse config from a TOML string. Env overrides win over file values.
    pub fn from_toml(toml_str: &str) -> Result<Self, FrameQueueError> {
        let mut config: Self = toml::from_str(toml_str)?;
        let profile = env_opt("FRAMEQUEUE_PROFILE").unwrap_or_default();
        config.apply_env_overrides(&profile.to_uppercase());
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FrameQueueError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub(crate) fn apply_env_overrides(&mut self, profile: &str) {
        if let Some(v) = profiled_env_parse(profile, "FRAMEQUEUE_WORKER_THREADS") {
            self.worker_threads = v;
        }
        if let Some(v) = profiled_env_parse(profile, "FRAMEQUEUE_THREADS_ENABLED") {
            self.threads_enabled = v;
        }
        if let Some(v) = profiled_env_parse(profile, "FRAMEQUEUE_NON_THREADED_WORK_MS") {
            self.non_threaded_work_ms = v;
        }
        if let Some(v) = profiled_env_parse(profile, "FRAMEQUEUE_POOL_TOLERANCE") {
            self.pool_tolerance = v;
        }
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), FrameQueueError> {
        if self.non_threaded_work_ms == 0 {
            return Err(FrameQueueError::Config(
                "non_threaded_work_ms must be at least 1".to_string(),
            ));
        }
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(FrameQueueError::Config(format!(
                "worker_threads = {} exceeds the limit of {MAX_WORKER_THREADS}",
                self.worker_threads
            )));
        }
        Ok(())
    }

    /// Resolve the worker thread count. Returns 0 when threading is disabled.
    pub fn resolved_worker_threads(&self) -> usize {
        if !self.threads_enabled {
            0
        } else if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(3)
        } else {
            self.worker_threads
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Work queue config:");
        tracing::info!(
            "  workers:     requested={}, resolved={}, enabled={}",
            self.worker_threads,
            self.resolved_worker_threads(),
            self.threads_enabled
        );
        tracing::info!("  fallback:    budget={}ms", self.non_threaded_work_ms);
        tracing::info!("  pool:        tolerance={}", self.pool_tolerance);
    }

    /// Config as a JSON value, for diagnostics output.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "worker_threads": self.worker_threads,
            "resolved_worker_threads": self.resolved_worker_threads(),
            "threads_enabled": self.threads_enabled,
            "non_threaded_work_ms": self.non_threaded_work_ms,
            "pool_tolerance": self.pool_tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorkQueueConfig::default();
        assert_eq!(config.worker_threads, 0);
        assert!(config.threads_enabled);
        assert_eq!(config.non_threaded_work_ms, 5);
        assert_eq!(config.pool_tolerance, 10);
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: WorkQueueConfig = toml::from_str("worker_threads = 3").unwrap();
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.non_threaded_work_ms, 5);
        assert_eq!(config.pool_tolerance, 10);
    }

    #[test]
    fn zero_budget_rejected() {
        let config = WorkQueueConfig {
            non_threaded_work_ms: 0,
            ..WorkQueueConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("non_threaded_work_ms"));
    }

    #[test]
    fn too_many_workers_rejected() {
        let config = WorkQueueConfig {
            worker_threads: 10_000,
            ..WorkQueueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = WorkQueueConfig::from_toml("worker_threads = \"many\"").unwrap_err();
        assert!(matches!(err, FrameQueueError::ConfigParse(_)));
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = WorkQueueConfig::default();
        // 0 means auto-detect
        assert!(config.resolved_worker_threads() > 0);

        config.worker_threads = 6;
        assert_eq!(config.resolved_worker_threads(), 6);

        config.threads_enabled = false;
        assert_eq!(config.resolved_worker_threads(), 0);
    }

    #[test]
    fn profiled_override_wins() {
        env::set_var("CFGTEST_FRAMEQUEUE_POOL_TOLERANCE", "42");
        let config = WorkQueueConfig::for_profile("cfgtest");
        assert_eq!(config.pool_tolerance, 42);
        env::remove_var("CFGTEST_FRAMEQUEUE_POOL_TOLERANCE");
    }

    #[test]
    fn summary_reports_fields() {
        let summary = WorkQueueConfig::default().summary();
        assert_eq!(summary["non_threaded_work_ms"], 5);
        assert_eq!(summary["pool_tolerance"], 10);
    }
}
