//! Push notification dispatch.
//!
//! The relay talks to a [`PushDispatcher`]. Production uses
//! [`ExpoPushService`]; [`NoopPush`] stands in when push is disabled.
//! Delivery is best-effort: failures come back as a [`PushOutcome`] and are
//! never retried.

pub mod expo;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub use expo::{ExpoConfig, ExpoPushService, is_valid_token};
pub use types::{PushError, PushMessage, PushOutcome};

/// Fire-and-forget push delivery to device tokens.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, token: &str, title: &str, body: &str, data: Value) -> PushOutcome {
        let message = PushMessage::new(token, title, body, data);
        self.send_batch(vec![message])
            .await
            .pop()
            .unwrap_or_else(|| PushOutcome::failed(token, "no outcome returned"))
    }

    /// Deliver several notifications. Returns one outcome per message, in order.
    async fn send_batch(&self, messages: Vec<PushMessage>) -> Vec<PushOutcome>;
}

/// Dispatcher used when push is disabled. Never touches the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPush;

#[async_trait]
impl PushDispatcher for NoopPush {
    async fn send_batch(&self, messages: Vec<PushMessage>) -> Vec<PushOutcome> {
        debug!(count = messages.len(), "push disabled, dropping notifications");
        messages
            .into_iter()
            .map(|m| PushOutcome::failed(&m.to, "push disabled"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn noop_reports_disabled() {
        let outcome = NoopPush
            .send("ExponentPushToken[abc]", "t", "b", json!({}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("push disabled"));
    }

    #[tokio::test]
    async fn noop_batch_keeps_order() {
        let outcomes = NoopPush
            .send_batch(vec![
                PushMessage::new("ExponentPushToken[a]", "t", "b", json!({})),
                PushMessage::new("ExponentPushToken[b]", "t", "b", json!({})),
            ])
            .await;
        let tokens: Vec<_> = outcomes.iter().map(|o| o.token.as_str()).collect();
        assert_eq!(tokens, ["ExponentPushToken[a]", "ExponentPushToken[b]"]);
    }
}
