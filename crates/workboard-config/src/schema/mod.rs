//! Configuration schema types for workboard.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod api;
mod logging;
mod realtime;
mod search;
mod storage;

pub use api::*;
pub use logging::*;
pub use realtime::*;
pub use search::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkboardConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}
