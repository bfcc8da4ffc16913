use serde::{Deserialize, Serialize};

/// Type-ahead search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a lookup fires (valid range: 50-5000).
    pub debounce_ms: u64,
    /// Maximum number of candidates delivered to the dropdown (valid range: 1-200).
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            max_results: 20,
        }
    }
}
