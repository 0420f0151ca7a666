//! Message log repository for the `messages` table.
//!
//! Rows are ordered by a per-interaction `seq`, so the log reads back in
//! append order even when timestamps collide.

use rusqlite::{Connection, params};
use sanchar_core::{Message, MessageId};

use super::{parse_enum, parse_time};
use crate::errors::Result;

struct MessageRow {
    message_id: String,
    sender_id: String,
    text: String,
    kind: String,
    timestamp: String,
    is_read: bool,
}

/// Message repository.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message at the end of an interaction's log. Returns its `seq`.
    pub fn append(conn: &Connection, interaction_id: &str, message: &Message) -> Result<i64> {
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE interaction_id = ?1",
            params![interaction_id],
            |row| row.get(0),
        )?;
        let _ = conn.execute(
            "INSERT INTO messages (interaction_id, seq, message_id, sender_id, text, kind, timestamp, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                interaction_id,
                seq,
                message.message_id.as_str(),
                message.sender_id,
                message.text,
                message.kind.as_str(),
                message.timestamp.to_rfc3339(),
                message.is_read,
            ],
        )?;
        Ok(seq)
    }

    /// Full log for an interaction, oldest first.
    pub fn list(conn: &Connection, interaction_id: &str) -> Result<Vec<Message>> {
        let mut stmt = conn.prepare(
            "SELECT message_id, sender_id, text, kind, timestamp, is_read
             FROM messages WHERE interaction_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![interaction_id], |row| {
                Ok(MessageRow {
                    message_id: row.get(0)?,
                    sender_id: row.get(1)?,
                    text: row.get(2)?,
                    kind: row.get(3)?,
                    timestamp: row.get(4)?,
                    is_read: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|r| {
                Ok(Message {
                    message_id: MessageId::from(r.message_id),
                    sender_id: r.sender_id,
                    text: r.text,
                    kind: parse_enum("messages.kind", &r.kind)?,
                    timestamp: parse_time("messages.timestamp", &r.timestamp)?,
                    is_read: r.is_read,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::InteractionRepo;
    use crate::sqlite::run_migrations;
    use sanchar_core::{Interaction, MessageKind, ScannerInfo};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        InteractionRepo::insert(
            &conn,
            &Interaction::new("int_1", "user_1", "veh_1", ScannerInfo::default()),
        )
        .unwrap();
        conn
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let conn = setup();
        let a = MessageRepo::append(&conn, "int_1", &Message::new(None, "scanner", "a", MessageKind::Text)).unwrap();
        let b = MessageRepo::append(&conn, "int_1", &Message::new(None, "user_1", "b", MessageKind::Text)).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn list_returns_append_order() {
        let conn = setup();
        for text in ["one", "two", "three"] {
            MessageRepo::append(&conn, "int_1", &Message::new(None, "scanner", text, MessageKind::Text)).unwrap();
        }
        MessageRepo::append(
            &conn,
            "int_1",
            &Message::new(None, "scanner", "Voice call started", MessageKind::Call),
        )
        .unwrap();

        let log = MessageRepo::list(&conn, "int_1").unwrap();
        let texts: Vec<_> = log.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three", "Voice call started"]);
        assert_eq!(log[3].kind, MessageKind::Call);
    }

    #[test]
    fn append_to_unknown_interaction_violates_foreign_key() {
        let conn = setup();
        let result = MessageRepo::append(&conn, "ghost", &Message::new(None, "scanner", "x", MessageKind::Text));
        assert!(result.is_err());
    }
}
