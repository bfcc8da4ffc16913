//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# workboard configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[api]
# origin = "http://localhost:8080"   # WORKBOARD_API_ORIGIN overrides this
# connect_timeout_secs = 10          # 1-120
# request_timeout_secs = 30          # 1-600

[realtime]
# alarms_path = "/api/alarms/subscribe"
# chat_path = "/ws-stomp"
# heartbeat_secs = 10                # 0 disables STOMP heart-beats
# connect_timeout_secs = 15

[realtime.reconnect]
# mode = "manual"                    # "manual" or "backoff"
# base_delay_ms = 1000
# max_delay_ms = 30000

[search]
# debounce_ms = 500                  # 50-5000
# max_results = 20                   # 1-200

[storage]
# credentials_path = "/path/to/credentials.json"

[logging]
# level = "info"                     # trace, debug, info, warn, error
"##
    .to_string()
}
