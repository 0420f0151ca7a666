//! Wire protocol: inbound client events and outbound envelopes.
//!
//! Inbound frames are `{"type": "<event>", "data": {...}}` with camelCase
//! fields. Outbound frames are `{"type", "timestamp", "data"}`.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use sanchar_core::{ConnectionId, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// `join_user_room` / `leave_user_room` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoom {
    /// User whose personal group to join or leave.
    pub user_id: String,
}

/// `join_room` / `leave_room` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRoom {
    /// Interaction whose chat group to join or leave.
    pub session_id: String,
}

/// `send_message` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Target interaction.
    pub session_id: String,
    /// Message text.
    pub text: String,
    /// `"scanner"` or the owner's user ID.
    pub sender_id: String,
    /// Client-generated ID; minted by the relay when absent.
    #[serde(default)]
    pub message_id: Option<MessageId>,
}

/// `start_call` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCall {
    /// Interaction the call belongs to, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// User group to ring.
    pub target_user_id: String,
    /// Opaque WebRTC offer.
    pub signal: Value,
    /// `"scanner"` or the owner's user ID.
    pub caller_id: String,
    /// Shown on the callee's ringing screen.
    #[serde(default)]
    pub caller_name: Option<String>,
}

/// Addressee of a signaling event.
///
/// On the wire a bare string is a connection ID (the `from` of an earlier
/// signaling event); `{"userId": "..."}` addresses that user's group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PeerTarget {
    /// One live connection.
    Connection(ConnectionId),
    /// Every connection in a user group.
    User {
        /// Owner of the group.
        #[serde(rename = "userId")]
        user_id: String,
    },
}

impl PeerTarget {
    /// The raw connection or user ID.
    pub fn id(&self) -> &str {
        match self {
            Self::Connection(id) => id.as_str(),
            Self::User { user_id } => user_id,
        }
    }
}

impl fmt::Display for PeerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(id) => write!(f, "conn:{id}"),
            Self::User { user_id } => write!(f, "user:{user_id}"),
        }
    }
}

/// `answer_call` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCall {
    /// Connection or user group of the caller.
    pub to: PeerTarget,
    /// Opaque WebRTC answer.
    pub signal: Value,
}

/// `ice_candidate` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Connection or user group of the peer.
    pub to: PeerTarget,
    /// Opaque ICE candidate.
    pub candidate: Value,
}

/// `end_call` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCall {
    /// Connection or user group of the peer.
    pub to: PeerTarget,
    /// Interaction the call belonged to.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `end_session` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSession {
    /// Interaction to resolve.
    pub session_id: String,
    /// Who closed it; echoed in `session_ended`.
    pub ended_by: String,
}

/// Every event a client may send.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a personal user group.
    JoinUserRoom(UserRoom),
    /// Leave a personal user group.
    LeaveUserRoom(UserRoom),
    /// Join a session chat group.
    JoinRoom(SessionRoom),
    /// Leave a session chat group.
    LeaveRoom(SessionRoom),
    /// Chat message.
    SendMessage(SendMessage),
    /// Call invitation.
    StartCall(StartCall),
    /// Call acceptance.
    AnswerCall(AnswerCall),
    /// ICE candidate relay.
    IceCandidate(IceCandidate),
    /// Hang up.
    EndCall(EndCall),
    /// Resolve the interaction.
    EndSession(EndSession),
}

impl ClientEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinUserRoom(_) => "join_user_room",
            Self::LeaveUserRoom(_) => "leave_user_room",
            Self::JoinRoom(_) => "join_room",
            Self::LeaveRoom(_) => "leave_room",
            Self::SendMessage(_) => "send_message",
            Self::StartCall(_) => "start_call",
            Self::AnswerCall(_) => "answer_call",
            Self::IceCandidate(_) => "ice_candidate",
            Self::EndCall(_) => "end_call",
            Self::EndSession(_) => "end_session",
        }
    }

    fn validate(&self) -> Result<(), String> {
        let required: Vec<(&str, &str)> = match self {
            Self::JoinUserRoom(p) | Self::LeaveUserRoom(p) => vec![("userId", p.user_id.as_str())],
            Self::JoinRoom(p) | Self::LeaveRoom(p) => vec![("sessionId", p.session_id.as_str())],
            Self::SendMessage(p) => vec![
                ("sessionId", p.session_id.as_str()),
                ("senderId", p.sender_id.as_str()),
                ("text", p.text.trim()),
            ],
            Self::StartCall(p) => vec![
                ("targetUserId", p.target_user_id.as_str()),
                ("callerId", p.caller_id.as_str()),
            ],
            Self::AnswerCall(AnswerCall { to, .. })
            | Self::IceCandidate(IceCandidate { to, .. })
            | Self::EndCall(EndCall { to, .. }) => vec![("to", to.id())],
            Self::EndSession(p) => vec![("sessionId", p.session_id.as_str())],
        };
        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(format!("{field} must not be empty")),
            None => Ok(()),
        }
    }
}

/// A frame that could not be turned into a [`ClientEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameError {
    /// Event name from the frame, or `"unknown"`.
    pub event: String,
    /// What was wrong.
    pub message: String,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Parse and validate one inbound text frame.
pub fn parse_frame(text: &str) -> Result<ClientEvent, FrameError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| FrameError {
        event: "unknown".into(),
        message: format!("malformed frame: {e}"),
    })?;
    let event = raw.event_type.clone();
    let parsed: ClientEvent =
        serde_json::from_value(json!({ "type": raw.event_type, "data": raw.data })).map_err(
            |e| FrameError {
                event: event.clone(),
                message: e.to_string(),
            },
        )?;
    parsed.validate().map_err(|message| FrameError { event, message })?;
    Ok(parsed)
}

/// Server-to-client envelope.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundEvent {
    /// Event name.
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// RFC 3339 with millisecond precision.
    pub timestamp: String,
    /// Event payload.
    pub data: Value,
}

impl OutboundEvent {
    /// Stamp an event with the current time.
    pub fn new(event_type: &'static str, data: Value) -> Self {
        Self {
            event_type,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
        }
    }

    /// `error {code, message, event}` addressed to one connection.
    pub fn error(code: &str, message: impl Into<String>, event: &str) -> Self {
        Self::new(
            "error",
            json!({ "code": code, "message": message.into(), "event": event }),
        )
    }

    /// Serialize once for fan-out.
    pub fn to_frame(&self) -> serde_json::Result<Arc<str>> {
        serde_json::to_string(self).map(Arc::from)
    }
}
