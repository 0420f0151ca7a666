//! Settings types. Every section defaults field-by-field so a partial
//! `settings.json` only needs the keys it overrides.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SancharSettings {
    /// Network listener and connection limits.
    pub server: ServerSettings,
    /// Relay engine behaviour.
    pub relay: RelaySettings,
    /// Push notification delivery.
    pub push: PushSettings,
    /// Durable store location.
    pub storage: StorageSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Network listener and connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a Pong before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_connections: 1000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            outbound_buffer: 256,
        }
    }
}

/// Relay engine behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Seconds between eager sweeps of expired pending calls.
    pub pending_sweep_interval_secs: u64,
    /// Only push when the recipient has no live connection.
    pub push_only_when_offline: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            pending_sweep_interval_secs: 10,
            push_only_when_offline: true,
        }
    }
}

/// Push notification delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Deliver push notifications at all.
    pub enabled: bool,
    /// Expo push API endpoint.
    pub endpoint: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Optional Expo access token (enhanced push security).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://exp.host/--/api/v2/push/send".to_string(),
            timeout_secs: 10,
            access_token: None,
        }
    }
}

/// Durable store location.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// `SQLite` database path. Empty means `~/.sanchar/sanchar.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: SancharSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.heartbeat_interval_secs, 30);
        assert_eq!(settings.relay.pending_sweep_interval_secs, 10);
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(SancharSettings::default()).unwrap();
        assert_eq!(v["server"]["maxConnections"], 1000);
        assert_eq!(v["relay"]["pushOnlyWhenOffline"], true);
        assert!(v["push"].get("accessToken").is_none());
    }
}
