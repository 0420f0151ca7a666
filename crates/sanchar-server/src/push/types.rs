//! Push message and outcome types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One notification in the Expo push request format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Expo push token.
    pub to: String,
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub body: String,
    /// Custom data delivered to the app.
    #[serde(default)]
    pub data: Value,
    /// Sound name.
    pub sound: String,
    /// `"high"` or `"normal"`.
    pub priority: String,
    /// Android notification channel.
    pub channel_id: String,
}

impl PushMessage {
    /// High-priority message on the default channel with the default sound.
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>, data: Value) -> Self {
        Self {
            to: to.into(),
            title: title.into(),
            body: body.into(),
            data,
            sound: "default".into(),
            priority: "high".into(),
            channel_id: "default".into(),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    /// Whether the provider accepted the message.
    pub success: bool,
    /// Targeted token.
    pub token: String,
    /// Provider ticket ID on success.
    pub ticket_id: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

impl PushOutcome {
    /// Accepted by the provider.
    pub fn delivered(token: &str, ticket_id: Option<String>) -> Self {
        Self {
            success: true,
            token: token.to_owned(),
            ticket_id,
            error: None,
        }
    }

    /// Not delivered.
    pub fn failed(token: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            token: token.to_owned(),
            ticket_id: None,
            error: Some(error.into()),
        }
    }
}

/// Transport-level push failures.
#[derive(Debug, Error)]
pub enum PushError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Request failed before a response arrived.
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("push provider returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}
