//! Engine-wide runtime configuration: phase timeouts and the directories
//! run artifacts land in.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for one engine invocation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Applied to every RUN_TO_END_OF_PHASE module's wait once its phase's
    /// RUN_ONCE modules have all completed.
    pub default_phase_timeout: Duration,
    /// Where the JSON run artifact and per-module artifact directories land.
    pub artifact_dir: PathBuf,
    /// Where structured run logs are written, in addition to stderr.
    pub log_dir: PathBuf,
    /// Upper bound on concurrently-running module tasks across the whole
    /// engine, enforced by a shared semaphore.
    pub max_in_flight_tasks: usize,
}

impl EngineConfig {
    pub fn new(artifact_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            default_phase_timeout: Duration::from_secs(300),
            artifact_dir,
            log_dir,
            max_in_flight_tasks: 256,
        }
    }

    /// Resolve a usable config from the environment: `FALLOUT_ARTIFACT_DIR`
    /// and `FALLOUT_LOG_DIR` override the `./fallout-runs` / `./fallout-logs`
    /// defaults.
    pub fn from_env() -> Self {
        let artifact_dir = std::env::var("FALLOUT_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("fallout-runs"));
        let log_dir = std::env::var("FALLOUT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("fallout-logs"));
        Self::new(artifact_dir, log_dir)
    }

    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.default_phase_timeout = timeout;
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.artifact_dir).context("failed to create artifact directory")?;
        std::fs::create_dir_all(&self.log_dir).context("failed to create log directory")?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("fallout-runs"), PathBuf::from("fallout-logs"))
    }
}
