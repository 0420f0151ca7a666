//! Directory records consulted (never mutated) by the relay.

use serde::{Deserialize, Serialize};

/// Per-user push notification switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    /// Master switch for push delivery.
    pub push_enabled: bool,
    /// Push for new chat messages.
    pub chat_messages: bool,
    /// Push for incoming calls.
    pub calls: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            push_enabled: true,
            chat_messages: true,
            calls: true,
        }
    }
}

impl NotificationPreferences {
    /// Whether a chat message may be pushed.
    pub fn allows_chat(&self) -> bool {
        self.push_enabled && self.chat_messages
    }

    /// Whether a call invitation may be pushed.
    pub fn allows_calls(&self) -> bool {
        self.push_enabled && self.calls
    }
}

/// Profile data the relay needs about a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User ID (also the user-group key).
    pub user_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Device push token, if the app registered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    /// Push switches.
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    /// Phone numbers this owner has blocked.
    #[serde(default)]
    pub blocked_numbers: Vec<String>,
}

impl UserProfile {
    /// Whether `number` is on this user's block list.
    ///
    /// Numbers are compared on their digits only, so `+91 98765-43210`
    /// matches `+919876543210`.
    pub fn has_blocked(&self, number: &str) -> bool {
        let wanted = digits(number);
        if wanted.is_empty() {
            return false;
        }
        self.blocked_numbers.iter().any(|b| digits(b) == wanted)
    }
}

fn digits(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

/// Vehicle data used when composing notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleProfile {
    /// Vehicle ID.
    pub vehicle_id: String,
    /// Registration plate shown to the owner.
    pub display_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(blocked: &[&str]) -> UserProfile {
        UserProfile {
            user_id: "user_1".into(),
            blocked_numbers: blocked.iter().map(|s| (*s).to_owned()).collect(),
            ..UserProfile::default()
        }
    }

    #[test]
    fn preferences_default_to_enabled() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.allows_chat());
        assert!(prefs.allows_calls());
    }

    #[test]
    fn master_switch_disables_everything() {
        let prefs = NotificationPreferences {
            push_enabled: false,
            ..NotificationPreferences::default()
        };
        assert!(!prefs.allows_chat());
        assert!(!prefs.allows_calls());
    }

    #[test]
    fn chat_switch_is_independent_of_calls() {
        let prefs = NotificationPreferences {
            chat_messages: false,
            ..NotificationPreferences::default()
        };
        assert!(!prefs.allows_chat());
        assert!(prefs.allows_calls());
    }

    #[test]
    fn block_list_ignores_formatting() {
        let user = owner(&["+91 98765-43210"]);
        assert!(user.has_blocked("+919876543210"));
        assert!(!user.has_blocked("+919876543211"));
    }

    #[test]
    fn empty_number_is_never_blocked() {
        let user = owner(&[""]);
        assert!(!user.has_blocked(""));
        assert!(!user.has_blocked("n/a"));
    }

    #[test]
    fn preferences_deserialize_partial() {
        let prefs: NotificationPreferences =
            serde_json::from_str(r#"{"calls": false}"#).unwrap();
        assert!(prefs.push_enabled);
        assert!(prefs.chat_messages);
        assert!(!prefs.calls);
    }
}
