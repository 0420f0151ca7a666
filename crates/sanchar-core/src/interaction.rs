//! Interaction (session) records and their message log.
//!
//! An [`Interaction`] is the durable record of one scanner-to-owner contact
//! episode. Its lifecycle is `active → resolved | ignored | reported`, and a
//! closed interaction can be woken up again by the scanner.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

/// Lifecycle status of an interaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
    /// Open for chat and calls.
    #[default]
    Active,
    /// Closed by a participant; carries a resolution timestamp.
    Resolved,
    /// Dismissed by the owner.
    Ignored,
    /// Closed through the report path.
    Reported,
}

impl InteractionStatus {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Ignored => "ignored",
            Self::Reported => "reported",
        }
    }

    /// Whether traffic may flow without reactivation.
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "ignored" => Ok(Self::Ignored),
            "reported" => Ok(Self::Reported),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_owned(),
            }),
        }
    }
}

/// How the scanner is currently reaching the owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMode {
    /// Tag scanned, no message exchanged yet.
    #[default]
    Scan,
    /// Text chat.
    Chat,
    /// Voice call.
    Call,
}

impl ContactMode {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Chat => "chat",
            Self::Call => "call",
        }
    }
}

impl fmt::Display for ContactMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(Self::Scan),
            "chat" => Ok(Self::Chat),
            "call" => Ok(Self::Call),
            other => Err(UnknownVariant {
                kind: "contact mode",
                value: other.to_owned(),
            }),
        }
    }
}

/// Kind of entry in the message log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Chat text.
    #[default]
    Text,
    /// Synthetic entry recording a call.
    Call,
}

impl MessageKind {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Call => "call",
        }
    }
}

impl FromStr for MessageKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "call" => Ok(Self::Call),
            other => Err(UnknownVariant {
                kind: "message kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// One immutable entry in an interaction's message log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID (client-supplied or minted by the relay).
    pub message_id: MessageId,
    /// `"scanner"` or the owner's user ID.
    pub sender_id: String,
    /// Message text.
    pub text: String,
    /// Text or call record.
    #[serde(default)]
    pub kind: MessageKind,
    /// When the relay accepted the message.
    pub timestamp: DateTime<Utc>,
    /// Read receipt flag.
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Build an unread message stamped with the current time.
    pub fn new(
        message_id: Option<MessageId>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            message_id: message_id.unwrap_or_default(),
            sender_id: sender_id.into(),
            text: text.into(),
            kind,
            timestamp: Utc::now(),
            is_read: false,
        }
    }
}

/// Network/device fingerprint captured when the scanner first made contact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerInfo {
    /// Scanner's phone number, checked against the owner's block list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Remote address at session start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Coarse location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Coarse location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Coarse location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Browser user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Device platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Browser language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Screen resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    /// Device timezone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// When this fingerprint was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Durable record of one scanner-to-owner contact episode.
///
/// Invariant: `resolved_at.is_some()` if and only if `status == Resolved`.
/// Every status change goes through [`Interaction::set_status`] to keep it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Opaque session ID.
    pub interaction_id: String,
    /// Owner's user ID.
    pub user_id: String,
    /// Tagged vehicle.
    pub vehicle_id: String,
    /// Current contact mode.
    #[serde(rename = "contactType", default)]
    pub contact_mode: ContactMode,
    /// Lifecycle status.
    #[serde(default)]
    pub status: InteractionStatus,
    /// Set only while resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Append-only message log.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Text of the most recent message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Scanner fingerprint.
    #[serde(default)]
    pub scanner: ScannerInfo,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Interaction {
    /// Create a fresh active interaction in `scan` mode.
    pub fn new(
        interaction_id: impl Into<String>,
        user_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        scanner: ScannerInfo,
    ) -> Self {
        let now = Utc::now();
        Self {
            interaction_id: interaction_id.into(),
            user_id: user_id.into(),
            vehicle_id: vehicle_id.into(),
            contact_mode: ContactMode::Scan,
            status: InteractionStatus::Active,
            resolved_at: None,
            messages: Vec::new(),
            last_message: None,
            scanner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the interaction currently accepts traffic.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Change status, keeping the resolution-timestamp invariant.
    ///
    /// `resolved_at` is honoured only for `Resolved`; a missing timestamp
    /// defaults to now. Every other status clears it.
    pub fn set_status(&mut self, status: InteractionStatus, resolved_at: Option<DateTime<Utc>>) {
        self.status = status;
        self.resolved_at = match status {
            InteractionStatus::Resolved => Some(resolved_at.unwrap_or_else(Utc::now)),
            _ => None,
        };
        self.updated_at = Utc::now();
    }

    /// Change the contact mode.
    pub fn set_contact_mode(&mut self, mode: ContactMode) {
        self.contact_mode = mode;
        self.updated_at = Utc::now();
    }

    /// Append a message and mirror its text into `last_message`.
    pub fn push_message(&mut self, message: Message) {
        self.last_message = Some(message.text.clone());
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// The scanner's recorded phone number, if captured.
    pub fn scanner_contact(&self) -> Option<&str> {
        self.scanner.phone_number.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interaction() -> Interaction {
        Interaction::new("int_1", "user_1", "veh_1", ScannerInfo::default())
    }

    #[test]
    fn new_interaction_is_active_scan() {
        let i = interaction();
        assert!(i.is_active());
        assert_eq!(i.contact_mode, ContactMode::Scan);
        assert!(i.resolved_at.is_none());
        assert!(i.messages.is_empty());
    }

    #[test]
    fn resolving_sets_timestamp() {
        let mut i = interaction();
        i.set_status(InteractionStatus::Resolved, None);
        assert_eq!(i.status, InteractionStatus::Resolved);
        assert!(i.resolved_at.is_some());
    }

    #[test]
    fn resolving_keeps_supplied_timestamp() {
        let mut i = interaction();
        let at = "2026-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        i.set_status(InteractionStatus::Resolved, Some(at));
        assert_eq!(i.resolved_at, Some(at));
    }

    #[test]
    fn non_resolved_status_clears_timestamp() {
        for status in [
            InteractionStatus::Active,
            InteractionStatus::Ignored,
            InteractionStatus::Reported,
        ] {
            let mut i = interaction();
            i.set_status(InteractionStatus::Resolved, None);
            i.set_status(status, Some(Utc::now()));
            assert!(i.resolved_at.is_none(), "{status} must not carry resolved_at");
        }
    }

    #[test]
    fn push_message_updates_last_message() {
        let mut i = interaction();
        i.push_message(Message::new(None, "scanner", "your lights are on", MessageKind::Text));
        i.push_message(Message::new(None, "user_1", "thanks", MessageKind::Text));
        assert_eq!(i.messages.len(), 2);
        assert_eq!(i.last_message.as_deref(), Some("thanks"));
        assert_eq!(i.messages[0].sender_id, "scanner");
    }

    #[test]
    fn message_defaults() {
        let m = Message::new(None, "scanner", "hi", MessageKind::Text);
        assert!(!m.is_read);
        assert!(!m.message_id.as_str().is_empty());
        let given = Message::new(Some("m-7".into()), "scanner", "hi", MessageKind::Call);
        assert_eq!(given.message_id.as_str(), "m-7");
        assert_eq!(given.kind, MessageKind::Call);
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut i = interaction();
        i.scanner.phone_number = Some("+911234567890".into());
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v["interactionId"], "int_1");
        assert_eq!(v["contactType"], "scan");
        assert_eq!(v["status"], "active");
        assert_eq!(v["scanner"]["phoneNumber"], "+911234567890");
        assert!(v.get("resolvedAt").is_none());
    }

    #[test]
    fn message_deserializes_without_kind() {
        let m: Message = serde_json::from_value(json!({
            "messageId": "m1",
            "senderId": "scanner",
            "text": "hello",
            "timestamp": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.kind, MessageKind::Text);
        assert!(!m.is_read);
    }

    #[test]
    fn enums_parse_from_storage() {
        assert_eq!("ignored".parse::<InteractionStatus>(), Ok(InteractionStatus::Ignored));
        assert_eq!("call".parse::<ContactMode>(), Ok(ContactMode::Call));
        assert_eq!("call".parse::<MessageKind>(), Ok(MessageKind::Call));
        let err = "missed".parse::<InteractionStatus>().unwrap_err();
        assert_eq!(err.value, "missed");
    }
}
