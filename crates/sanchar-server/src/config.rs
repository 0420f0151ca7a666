//! Server configuration.

use std::time::Duration;

use sanchar_settings::SancharSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`SancharServer`](crate::SancharServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent `WebSocket` connections.
    pub max_connections: usize,
    /// Interval between server Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Drop a connection that has been silent this long, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
    /// How often expired pending calls are purged, in seconds.
    pub pending_sweep_interval_secs: u64,
    /// Push only when the recipient has no live connection.
    pub push_only_when_offline: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            outbound_buffer: 256,
            pending_sweep_interval_secs: 10,
            push_only_when_offline: true,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &SancharSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
            max_message_size: settings.server.max_message_size,
            outbound_buffer: settings.server.outbound_buffer,
            pending_sweep_interval_secs: settings.relay.pending_sweep_interval_secs,
            push_only_when_offline: settings.relay.push_only_when_offline,
        }
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Pong timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }

    /// Pending call sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.pending_sweep_interval_secs.max(1))
    }
}
