//! Pending call buffer.
//!
//! Holds at most one undelivered call invitation per target user so a
//! callee that reconnects shortly after the call started still rings.
//! Every read re-checks the TTL; the sweeper only reclaims memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sanchar_core::ConnectionId;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::PENDING_CALLS_EXPIRED_TOTAL;

/// A buffered call invitation.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCall {
    /// Opaque WebRTC offer.
    pub signal: Value,
    /// `"scanner"` or the owner's user ID.
    pub caller_id: String,
    /// Caller display name.
    pub caller_name: Option<String>,
    /// Interaction the call belongs to.
    pub session_id: Option<String>,
    /// Caller's connection, used as the reply address.
    pub from: ConnectionId,
    /// When the call was placed.
    pub created_at: Instant,
}

impl PendingCall {
    /// `callMade` payload, identical to the live invitation.
    pub fn call_made_payload(&self) -> Value {
        json!({
            "signal": self.signal,
            "from": self.from,
            "callerId": self.caller_id,
            "callerName": self.caller_name,
            "sessionId": self.session_id,
        })
    }

    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

/// Keyed store of pending calls, one per target user.
#[derive(Debug)]
pub struct PendingCallBuffer {
    entries: Mutex<HashMap<String, PendingCall>>,
    ttl: Duration,
}

impl PendingCallBuffer {
    /// Create a buffer whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a call for `target`, replacing any earlier one.
    /// Returns whether an entry was replaced.
    pub fn put(&self, target: &str, call: PendingCall) -> bool {
        self.entries.lock().insert(target.to_owned(), call).is_some()
    }

    /// Remove and return the live entry for `target`.
    ///
    /// An expired entry is deleted and `None` is returned.
    pub fn take(&self, target: &str, now: Instant) -> Option<PendingCall> {
        let call = self.entries.lock().remove(target)?;
        if call.is_live(now, self.ttl) {
            Some(call)
        } else {
            debug!(user_id = target, "pending call expired on read");
            metrics::counter!(PENDING_CALLS_EXPIRED_TOTAL).increment(1);
            None
        }
    }

    /// Cancel the entry for `target`. Returns whether one existed.
    pub fn remove(&self, target: &str) -> bool {
        self.entries.lock().remove(target).is_some()
    }

    /// Delete every expired entry. Returns how many were purged.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, call| call.is_live(now, self.ttl));
        let purged = before - entries.len();
        if purged > 0 {
            metrics::counter!(PENDING_CALLS_EXPIRED_TOTAL).increment(purged as u64);
        }
        purged
    }

    /// Entries currently held (live or not yet purged).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Purge expired entries every `interval` until `cancel` fires.
pub fn spawn_sweeper(
    buffer: Arc<PendingCallBuffer>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = buffer.purge_expired(Instant::now());
                    if purged > 0 {
                        debug!(purged, "swept expired pending calls");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanchar_core::constants::PENDING_CALL_TTL;

    fn call(caller: &str, created_at: Instant) -> PendingCall {
        PendingCall {
            signal: json!({"sdp": "offer"}),
            caller_id: caller.into(),
            caller_name: Some("Scanner".into()),
            session_id: Some("int_1".into()),
            from: ConnectionId::from("conn_caller"),
            created_at,
        }
    }

    #[test]
    fn take_within_ttl_delivers_once() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let t0 = Instant::now();
        let _ = buffer.put("user_1", call("scanner", t0));

        let got = buffer.take("user_1", t0 + Duration::from_secs(10));
        assert_eq!(got.map(|c| c.caller_id), Some("scanner".to_owned()));
        assert!(buffer.take("user_1", t0 + Duration::from_secs(11)).is_none());
    }

    #[test]
    fn take_after_ttl_purges() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let t0 = Instant::now();
        let _ = buffer.put("user_1", call("scanner", t0));

        assert!(buffer.take("user_1", t0 + Duration::from_secs(40)).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn ttl_boundary_is_expired() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let t0 = Instant::now();
        let _ = buffer.put("user_1", call("scanner", t0));
        assert!(buffer.take("user_1", t0 + PENDING_CALL_TTL).is_none());
    }

    #[test]
    fn put_overwrites_previous_call() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let t0 = Instant::now();
        assert!(!buffer.put("user_1", call("scanner", t0)));
        assert!(buffer.put("user_1", call("user_9", t0)));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.take("user_1", t0).unwrap().caller_id, "user_9");
    }

    #[test]
    fn remove_cancels() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let _ = buffer.put("user_1", call("scanner", Instant::now()));
        assert!(buffer.remove("user_1"));
        assert!(!buffer.remove("user_1"));
    }

    #[test]
    fn purge_keeps_live_entries() {
        let buffer = PendingCallBuffer::new(PENDING_CALL_TTL);
        let t0 = Instant::now();
        let _ = buffer.put("old", call("scanner", t0));
        let _ = buffer.put("new", call("scanner", t0 + Duration::from_secs(25)));

        assert_eq!(buffer.purge_expired(t0 + Duration::from_secs(31)), 1);
        assert_eq!(buffer.len(), 1);
        assert!(buffer.take("new", t0 + Duration::from_secs(31)).is_some());
    }

    #[test]
    fn payload_carries_reply_address() {
        let payload = call("scanner", Instant::now()).call_made_payload();
        assert_eq!(payload["from"], "conn_caller");
        assert_eq!(payload["callerId"], "scanner");
        assert_eq!(payload["sessionId"], "int_1");
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_in_background() {
        let buffer = Arc::new(PendingCallBuffer::new(PENDING_CALL_TTL));
        let _ = buffer.put("user_1", call("scanner", Instant::now()));
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&buffer), Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(buffer.len(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(buffer.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
