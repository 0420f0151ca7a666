//! Inbound frame dispatch: parse, validate, hand to the relay engine.

use sanchar_core::ConnectionId;
use tracing::{debug, instrument};

use super::protocol::parse_frame;
use crate::relay::{RelayEngine, RelayError};

/// Handle one inbound text frame from `conn_id`.
///
/// Frames that fail to parse or validate are answered with an
/// `INVALID_PARAMS` error to the sender and otherwise ignored.
#[instrument(skip_all, fields(conn_id = %conn_id, event))]
pub async fn handle_frame(text: &str, conn_id: &ConnectionId, engine: &RelayEngine) {
    match parse_frame(text) {
        Ok(event) => {
            let _ = tracing::Span::current().record("event", event.name());
            engine.handle(conn_id, event).await;
        }
        Err(err) => {
            debug!(event = %err.event, reason = %err.message, "rejected frame");
            engine.reject(conn_id, &err.event, &RelayError::InvalidParams(err.message));
        }
    }
}
