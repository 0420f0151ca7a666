//! Expo push service: token validation and HTTP delivery via `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use sanchar_settings::PushSettings;
use serde::Deserialize;
use tracing::{info, warn};

use super::PushDispatcher;
use super::types::{PushError, PushMessage, PushOutcome};

/// Expo accepts at most this many messages per request.
const MAX_BATCH: usize = 100;

/// Expo endpoint configuration.
#[derive(Clone, Debug)]
pub struct ExpoConfig {
    /// Push send endpoint.
    pub endpoint: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Optional bearer token for enhanced push security.
    pub access_token: Option<String>,
}

impl ExpoConfig {
    /// Build from the `push` settings section.
    pub fn from_settings(settings: &PushSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            access_token: settings.access_token.clone(),
        }
    }
}

/// Whether `token` looks like an Expo push token.
pub fn is_valid_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .any(|prefix| token.len() > prefix.len() + 1 && token.starts_with(prefix))
        && token.ends_with(']')
}

fn token_prefix(token: &str) -> &str {
    token.get(..24).unwrap_or(token)
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    #[serde(default)]
    data: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    status: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends notifications through the Expo push API.
pub struct ExpoPushService {
    config: ExpoConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for ExpoPushService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpoPushService")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl ExpoPushService {
    /// Build the HTTP client.
    pub fn new(config: ExpoConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PushError::ClientBuild(e.to_string()))?;
        info!(endpoint = %config.endpoint, "expo push service initialized");
        Ok(Self { config, client })
    }

    async fn post_chunk(&self, chunk: &[PushMessage]) -> Result<Vec<Ticket>, PushError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("accept", "application/json")
            .json(chunk);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let tickets: TicketResponse = response.json().await?;
        Ok(tickets.data)
    }
}

#[async_trait]
impl PushDispatcher for ExpoPushService {
    async fn send_batch(&self, messages: Vec<PushMessage>) -> Vec<PushOutcome> {
        let mut outcomes: Vec<Option<PushOutcome>> = vec![None; messages.len()];
        let mut valid = Vec::with_capacity(messages.len());

        for (index, message) in messages.into_iter().enumerate() {
            if is_valid_token(&message.to) {
                valid.push((index, message));
            } else {
                warn!(token = token_prefix(&message.to), "invalid expo push token");
                outcomes[index] = Some(PushOutcome::failed(&message.to, "invalid token format"));
            }
        }

        for chunk in valid.chunks(MAX_BATCH) {
            let payload: Vec<PushMessage> = chunk.iter().map(|(_, m)| m.clone()).collect();
            match self.post_chunk(&payload).await {
                Ok(tickets) => {
                    for (position, (index, message)) in chunk.iter().enumerate() {
                        let outcome = match tickets.get(position) {
                            Some(t) if t.status == "ok" => {
                                PushOutcome::delivered(&message.to, t.id.clone())
                            }
                            Some(t) => {
                                let reason = t.message.clone().unwrap_or_else(|| t.status.clone());
                                warn!(token = token_prefix(&message.to), reason = %reason, "expo rejected push");
                                PushOutcome::failed(&message.to, reason)
                            }
                            None => PushOutcome::failed(&message.to, "missing ticket"),
                        };
                        outcomes[*index] = Some(outcome);
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = chunk.len(), "expo push request failed");
                    for (index, message) in chunk {
                        outcomes[*index] = Some(PushOutcome::failed(&message.to, e.to_string()));
                    }
                }
            }
        }

        outcomes.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer, access_token: Option<&str>) -> ExpoPushService {
        ExpoPushService::new(ExpoConfig {
            endpoint: format!("{}/--/api/v2/push/send", server.uri()),
            timeout: Duration::from_secs(2),
            access_token: access_token.map(Into::into),
        })
        .unwrap()
    }

    #[test]
    fn token_format() {
        assert!(is_valid_token("ExponentPushToken[abc123]"));
        assert!(is_valid_token("ExpoPushToken[abc123]"));
        assert!(!is_valid_token("ExponentPushToken[]"));
        assert!(!is_valid_token("ExponentPushToken[abc"));
        assert!(!is_valid_token("fcm:abc"));
        assert!(!is_valid_token(""));
    }

    #[tokio::test]
    async fn invalid_token_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = service(&server, None)
            .send("not-a-token", "t", "b", json!({}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("invalid token format"));
    }

    #[tokio::test]
    async fn successful_send_returns_ticket() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/--/api/v2/push/send"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"status": "ok", "id": "ticket-1"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(&server, Some("secret"))
            .send("ExponentPushToken[abc]", "New message", "hi", json!({"interactionId": "int_1"}))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.ticket_id.as_deref(), Some("ticket-1"));
    }

    #[tokio::test]
    async fn ticket_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"status": "error", "message": "DeviceNotRegistered"}]
            })))
            .mount(&server)
            .await;

        let outcome = service(&server, None)
            .send("ExponentPushToken[gone]", "t", "b", json!({}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("DeviceNotRegistered"));
    }

    #[tokio::test]
    async fn http_failure_is_swallowed_into_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let outcome = service(&server, None)
            .send("ExponentPushToken[abc]", "t", "b", json!({}))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn batch_is_chunked_and_keeps_order() {
        let server = MockServer::start().await;
        let tickets: Vec<_> = (0..100).map(|i| json!({"status": "ok", "id": format!("t{i}")})).collect();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": tickets })))
            .expect(2)
            .mount(&server)
            .await;

        let mut messages: Vec<_> = (0..150)
            .map(|i| PushMessage::new(format!("ExponentPushToken[{i}]"), "t", "b", json!({})))
            .collect();
        messages.insert(3, PushMessage::new("bogus", "t", "b", json!({})));

        let outcomes = service(&server, None).send_batch(messages).await;
        assert_eq!(outcomes.len(), 151);
        assert!(!outcomes[3].success);
        assert_eq!(outcomes[3].token, "bogus");
        assert_eq!(outcomes.iter().filter(|o| o.success).count(), 150);
        assert_eq!(outcomes[150].token, "ExponentPushToken[149]");
    }
}
