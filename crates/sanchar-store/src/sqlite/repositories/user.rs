//! User directory repository for the `users` table.

use rusqlite::{Connection, OptionalExtension, params};
use sanchar_core::{NotificationPreferences, UserProfile};

use crate::errors::Result;

/// User repository.
pub struct UserRepo;

impl UserRepo {
    /// Insert or replace a user profile.
    pub fn upsert(conn: &Connection, user: &UserProfile) -> Result<()> {
        let blocked = serde_json::to_string(&user.blocked_numbers)?;
        let prefs = user.notification_preferences;
        let _ = conn.execute(
            "INSERT INTO users (user_id, name, push_token, push_enabled, chat_messages, calls, blocked_numbers)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
                 name = excluded.name,
                 push_token = excluded.push_token,
                 push_enabled = excluded.push_enabled,
                 chat_messages = excluded.chat_messages,
                 calls = excluded.calls,
                 blocked_numbers = excluded.blocked_numbers",
            params![
                user.user_id,
                user.name,
                user.push_token,
                prefs.push_enabled,
                prefs.chat_messages,
                prefs.calls,
                blocked,
            ],
        )?;
        Ok(())
    }

    /// Look up a user profile.
    pub fn get(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>> {
        let row = conn
            .query_row(
                "SELECT user_id, name, push_token, push_enabled, chat_messages, calls, blocked_numbers
                 FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        UserProfile {
                            user_id: row.get(0)?,
                            name: row.get(1)?,
                            push_token: row.get(2)?,
                            notification_preferences: NotificationPreferences {
                                push_enabled: row.get(3)?,
                                chat_messages: row.get(4)?,
                                calls: row.get(5)?,
                            },
                            blocked_numbers: Vec::new(),
                        },
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(mut user, blocked)| {
            user.blocked_numbers = serde_json::from_str(&blocked)?;
            Ok(user)
        })
        .transpose()
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_and_get() {
        let conn = setup();
        let user = UserProfile {
            user_id: "user_1".into(),
            name: Some("Asha".into()),
            push_token: Some("ExponentPushToken[xyz]".into()),
            notification_preferences: NotificationPreferences {
                push_enabled: true,
                chat_messages: false,
                calls: true,
            },
            blocked_numbers: vec!["+911111111111".into()],
        };
        UserRepo::upsert(&conn, &user).unwrap();
        assert_eq!(UserRepo::get(&conn, "user_1").unwrap(), Some(user));
    }

    #[test]
    fn upsert_replaces_existing() {
        let conn = setup();
        let mut user = UserProfile {
            user_id: "user_1".into(),
            ..UserProfile::default()
        };
        UserRepo::upsert(&conn, &user).unwrap();
        user.push_token = Some("ExpoPushToken[new]".into());
        UserRepo::upsert(&conn, &user).unwrap();

        let loaded = UserRepo::get(&conn, "user_1").unwrap().unwrap();
        assert_eq!(loaded.push_token.as_deref(), Some("ExpoPushToken[new]"));
    }

    #[test]
    fn missing_user_is_none() {
        let conn = setup();
        assert!(UserRepo::get(&conn, "nobody").unwrap().is_none());
    }
}
