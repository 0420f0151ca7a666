//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is running.
    pub status: &'static str,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Live `WebSocket` connections.
    pub connections: usize,
    /// Buffered call invitations not yet delivered or expired.
    pub pending_calls: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, pending_calls: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        pending_calls,
    }
}
