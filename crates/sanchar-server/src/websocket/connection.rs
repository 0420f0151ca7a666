//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sanchar_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::warn;

use super::protocol::OutboundEvent;

/// One live `WebSocket` client.
///
/// Outbound frames go through a bounded queue drained by the session's
/// writer task, so sending never blocks the caller.
#[derive(Debug)]
pub struct ClientConnection {
    /// Connection ID, also used as the reply address for call signaling.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
    /// When the upgrade completed.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending half of a connection's outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a serialized frame. Returns `false` if the queue is full or closed.
    pub fn send(&self, frame: Arc<str>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(crate::metrics::WS_SEND_DROPS_TOTAL).increment(1);
            false
        }
    }

    /// Serialize and queue an event for this connection only.
    pub fn send_event(&self, event: &OutboundEvent) -> bool {
        match event.to_frame() {
            Ok(frame) => self.send(frame),
            Err(e) => {
                warn!(conn_id = %self.id, event = event.event_type, error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Frames dropped so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record inbound activity (pong or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Return and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity.
    pub fn silent_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ConnectionId::from("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_queues_frame() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send(Arc::from("hello")));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn full_queue_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::from("a")));
        assert!(!conn.send(Arc::from("b")));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_fails() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send(Arc::from("x")));
    }

    #[tokio::test]
    async fn send_event_serializes_envelope() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send_event(&OutboundEvent::new("callEnded", json!({"from": "c2"}))));
        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "callEnded");
        assert_eq!(frame["data"]["from"], "c2");
    }

    #[test]
    fn alive_flag_resets_on_check() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.silent_for() < Duration::from_secs(1));
    }
}
