//! Per-connection lifecycle from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use sanchar_core::ConnectionId;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::handle_frame;
use super::protocol::OutboundEvent;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::relay::RelayEngine;

/// Heartbeat and queue settings for one session.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
    /// Disconnect after this long without any inbound frame.
    pub silence_timeout: Duration,
    /// Outbound queue depth.
    pub outbound_buffer: usize,
}

/// Run one `WebSocket` session.
///
/// 1. Registers the connection and announces its ID with `connection.established`
/// 2. Dispatches inbound text (or UTF-8 binary) frames to the relay
/// 3. Drains the outbound queue and pings on an interval
/// 4. Closes silent clients and honours server shutdown
/// 5. Drops the connection from every group on exit
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    engine: Arc<RelayEngine>,
    options: SessionOptions,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(options.outbound_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    let started = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    engine.groups().register(Arc::clone(&connection));
    let _ = connection.send_event(&OutboundEvent::new(
        "connection.established",
        json!({ "clientId": conn_id }),
    ));

    let closed = shutdown.child_token();
    let writer_conn = Arc::clone(&connection);
    let writer_closed = closed.clone();
    let writer = tokio::spawn(async move {
        let _close_reader = writer_closed.clone().drop_guard();
        let mut ping = tokio::time::interval(options.ping_interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if !writer_conn.check_alive() && writer_conn.silent_for() > options.silence_timeout {
                        warn!(silent = ?writer_conn.silent_for(), "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = closed.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };
        connection.mark_alive();

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        handle_frame(&text, &conn_id, &engine).await;
    }

    engine.disconnect(&conn_id);
    closed.cancel();
    if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
        debug!("writer did not finish in time");
    }
    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}
