//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the theme orchestrator and sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Leave files that already exist untouched instead of downloading again.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,

    /// Name of the dedup store file under the storage directory.
    #[serde(default = "default_dedup_store")]
    pub dedup_store: String,

    /// Sweep requests within this many seconds of the last sweep are ignored.
    #[serde(default = "default_sweep_backoff")]
    pub sweep_backoff_secs: u64,

    /// Run a full sweep on this interval (0 = only on request).
    #[serde(default)]
    pub sweep_interval_secs: u64,
}

fn default_skip_existing() -> bool {
    true
}

fn default_dedup_store() -> String {
    "theme-songs".to_string()
}

fn default_sweep_backoff() -> u64 {
    30 * 60 // 30 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            skip_existing: default_skip_existing(),
            dedup_store: default_dedup_store(),
            sweep_backoff_secs: default_sweep_backoff(),
            sweep_interval_secs: 0,
        }
    }
}
