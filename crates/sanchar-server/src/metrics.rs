//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before any metric is recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on a full queue (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Inbound relay events handled (counter, labels: event).
pub const RELAY_EVENTS_TOTAL: &str = "relay_events_total";
/// Inbound relay events rejected (counter, labels: code).
pub const RELAY_REJECTIONS_TOTAL: &str = "relay_rejections_total";
/// Push attempts (counter, labels: outcome).
pub const PUSH_SENDS_TOTAL: &str = "push_sends_total";
/// Buffered call invitations delivered on rejoin (counter).
pub const PENDING_CALLS_DELIVERED_TOTAL: &str = "pending_calls_delivered_total";
/// Buffered call invitations discarded after the TTL (counter).
pub const PENDING_CALLS_EXPIRED_TOTAL: &str = "pending_calls_expired_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_recorder_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(RELAY_EVENTS_TOTAL, "event" => "send_message").increment(1);
        });
        assert!(handle.render().contains("relay_events_total"));
    }

    #[test]
    fn names_are_snake_case() {
        for name in [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_SEND_DROPS_TOTAL,
            RELAY_EVENTS_TOTAL,
            RELAY_REJECTIONS_TOTAL,
            PUSH_SENDS_TOTAL,
            PENDING_CALLS_DELIVERED_TOTAL,
            PENDING_CALLS_EXPIRED_TOTAL,
        ] {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }
}
