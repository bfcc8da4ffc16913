//! Full configuration validation.
//!
//! Validates numeric ranges, the backend origin, and channel paths.

use crate::schema::WorkboardConfig;
use workboard_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &WorkboardConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    // Backend origin
    let origin = config.api.origin.as_str();
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        errors.push(format!("api.origin = {origin:?} must start with http:// or https://"));
    } else if origin.trim_end_matches('/').matches('/').count() > 2 {
        errors.push(format!("api.origin = {origin:?} must not contain a path"));
    }
    validate_range(&mut errors, "api.connect_timeout_secs", config.api.connect_timeout_secs, 1, 120);
    validate_range(&mut errors, "api.request_timeout_secs", config.api.request_timeout_secs, 1, 600);

    // Realtime
    validate_path(&mut errors, "realtime.alarms_path", &config.realtime.alarms_path);
    validate_path(&mut errors, "realtime.chat_path", &config.realtime.chat_path);
    validate_range(&mut errors, "realtime.heartbeat_secs", config.realtime.heartbeat_secs, 0, 300);
    validate_range(
        &mut errors,
        "realtime.connect_timeout_secs",
        config.realtime.connect_timeout_secs,
        1,
        120,
    );
    let reconnect = &config.realtime.reconnect;
    validate_range_u64(&mut errors, "realtime.reconnect.base_delay_ms", reconnect.base_delay_ms, 10, 60_000);
    if reconnect.max_delay_ms < reconnect.base_delay_ms {
        errors.push(format!(
            "realtime.reconnect.max_delay_ms = {} is below base_delay_ms = {}",
            reconnect.max_delay_ms, reconnect.base_delay_ms
        ));
    }

    // Search
    validate_range_u64(&mut errors, "search.debounce_ms", config.search.debounce_ms, 50, 5_000);
    validate_range(&mut errors, "search.max_results", config.search.max_results, 1, 200);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

fn validate_range_u64(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

fn validate_path(errors: &mut Vec<String>, name: &str, value: &str) {
    if !value.starts_with('/') {
        errors.push(format!("{name} = {value:?} must start with '/'"));
    }
}
