//! Interaction repository for the `interactions` table.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sanchar_core::{ContactMode, Interaction, InteractionStatus, ScannerInfo};

use super::{MessageRepo, parse_enum, parse_time};
use crate::errors::Result;

struct InteractionRow {
    interaction_id: String,
    user_id: String,
    vehicle_id: String,
    contact_type: String,
    status: String,
    resolved_at: Option<String>,
    last_message: Option<String>,
    scanner_json: String,
    created_at: String,
    updated_at: String,
}

/// Interaction repository.
pub struct InteractionRepo;

impl InteractionRepo {
    /// Insert or replace an interaction together with its message log.
    ///
    /// Run inside a transaction so a half-written log is never visible.
    pub fn insert(conn: &Connection, interaction: &Interaction) -> Result<()> {
        let scanner_json = serde_json::to_string(&interaction.scanner)?;
        let _ = conn.execute(
            "DELETE FROM messages WHERE interaction_id = ?1",
            params![interaction.interaction_id],
        )?;
        let _ = conn.execute(
            "INSERT OR REPLACE INTO interactions (interaction_id, user_id, vehicle_id, contact_type,
                 status, resolved_at, last_message, scanner_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                interaction.interaction_id,
                interaction.user_id,
                interaction.vehicle_id,
                interaction.contact_mode.as_str(),
                interaction.status.as_str(),
                interaction.resolved_at.map(|t| t.to_rfc3339()),
                interaction.last_message,
                scanner_json,
                interaction.created_at.to_rfc3339(),
                interaction.updated_at.to_rfc3339(),
            ],
        )?;
        for message in &interaction.messages {
            let _ = MessageRepo::append(conn, &interaction.interaction_id, message)?;
        }
        Ok(())
    }

    /// Load an interaction and its full message log.
    pub fn get(conn: &Connection, interaction_id: &str) -> Result<Option<Interaction>> {
        let row = conn
            .query_row(
                "SELECT interaction_id, user_id, vehicle_id, contact_type, status, resolved_at,
                        last_message, scanner_json, created_at, updated_at
                 FROM interactions WHERE interaction_id = ?1",
                params![interaction_id],
                |row| {
                    Ok(InteractionRow {
                        interaction_id: row.get(0)?,
                        user_id: row.get(1)?,
                        vehicle_id: row.get(2)?,
                        contact_type: row.get(3)?,
                        status: row.get(4)?,
                        resolved_at: row.get(5)?,
                        last_message: row.get(6)?,
                        scanner_json: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let messages = MessageRepo::list(conn, &row.interaction_id)?;
        let scanner: ScannerInfo = serde_json::from_str(&row.scanner_json)?;

        Ok(Some(Interaction {
            contact_mode: parse_enum("interactions.contact_type", &row.contact_type)?,
            status: parse_enum("interactions.status", &row.status)?,
            resolved_at: row
                .resolved_at
                .as_deref()
                .map(|t| parse_time("interactions.resolved_at", t))
                .transpose()?,
            created_at: parse_time("interactions.created_at", &row.created_at)?,
            updated_at: parse_time("interactions.updated_at", &row.updated_at)?,
            interaction_id: row.interaction_id,
            user_id: row.user_id,
            vehicle_id: row.vehicle_id,
            last_message: row.last_message,
            scanner,
            messages,
        }))
    }

    /// Set status and resolution time. Returns whether a row was updated.
    ///
    /// The caller supplies `resolved_at` already normalised for `status`.
    pub fn update_status(
        conn: &Connection,
        interaction_id: &str,
        status: InteractionStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE interactions SET status = ?1, resolved_at = ?2, updated_at = ?3
             WHERE interaction_id = ?4",
            params![
                status.as_str(),
                resolved_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
                interaction_id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Set the contact mode. Returns whether a row was updated.
    pub fn update_contact_mode(
        conn: &Connection,
        interaction_id: &str,
        mode: ContactMode,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE interactions SET contact_type = ?1, updated_at = ?2 WHERE interaction_id = ?3",
            params![mode.as_str(), Utc::now().to_rfc3339(), interaction_id],
        )?;
        Ok(changed > 0)
    }

    /// Mirror the newest message text. Returns whether a row was updated.
    pub fn update_last_message(conn: &Connection, interaction_id: &str, text: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE interactions SET last_message = ?1, updated_at = ?2 WHERE interaction_id = ?3",
            params![text, Utc::now().to_rfc3339(), interaction_id],
        )?;
        Ok(changed > 0)
    }

    /// Whether the interaction exists.
    pub fn exists(conn: &Connection, interaction_id: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM interactions WHERE interaction_id = ?1",
                params![interaction_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
