//! [`SqliteStore`]: the durable store behind the relay.
//!
//! Each trait call checks out a pooled connection on the blocking thread
//! pool, runs its statements in one transaction, and reloads the record.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use sanchar_core::{
    ContactMode, DirectoryLookup, Interaction, InteractionStatus, Message, SessionStore,
    StoreError, UserProfile, VehicleProfile,
};
use tracing::{debug, instrument};

use crate::errors::{Result, SqliteStoreError};
use crate::sqlite::repositories::{InteractionRepo, MessageRepo, UserRepo, VehicleRepo};
use crate::sqlite::{ConnectionConfig, ConnectionPool, new_file, new_in_memory, run_migrations};

/// `SQLite`-backed [`SessionStore`] and [`DirectoryLookup`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<ConnectionPool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: &str) -> Result<Self> {
        let pool = new_file(path, &ConnectionConfig::default())?;
        Self::from_pool(pool)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(new_in_memory()?)
    }

    /// Wrap an existing pool, applying pending migrations.
    pub fn from_pool(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let applied = run_migrations(&conn)?;
            debug!(applied, "sqlite store ready");
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Insert or replace an interaction.
    pub fn insert_interaction(&self, interaction: &Interaction) -> Result<()> {
        self.with_tx(|conn| InteractionRepo::insert(conn, interaction))
    }

    /// Insert or replace a user profile.
    pub fn upsert_user(&self, user: &UserProfile) -> Result<()> {
        let conn = self.pool.get()?;
        UserRepo::upsert(&conn, user)
    }

    /// Insert or replace a vehicle profile.
    pub fn upsert_vehicle(&self, vehicle: &VehicleProfile) -> Result<()> {
        let conn = self.pool.get()?;
        VehicleRepo::upsert(&conn, vehicle)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` in a transaction on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> sanchar_core::errors::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_tx(f))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
            .map_err(StoreError::from)
    }
}

fn reload(conn: &Connection, session_id: &str) -> Result<Interaction> {
    InteractionRepo::get(conn, session_id)?
        .ok_or_else(|| SqliteStoreError::InteractionNotFound(session_id.to_owned()))
}

fn require_changed(changed: bool, session_id: &str) -> Result<()> {
    if changed {
        Ok(())
    } else {
        Err(SqliteStoreError::InteractionNotFound(session_id.to_owned()))
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    #[instrument(skip(self))]
    async fn find_by_id(&self, session_id: &str) -> sanchar_core::errors::Result<Option<Interaction>> {
        let id = session_id.to_owned();
        self.blocking(move |conn| InteractionRepo::get(conn, &id)).await
    }

    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    async fn append_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> sanchar_core::errors::Result<Interaction> {
        let id = session_id.to_owned();
        self.blocking(move |conn| {
            require_changed(InteractionRepo::exists(conn, &id)?, &id)?;
            let _ = MessageRepo::append(conn, &id, &message)?;
            let _ = InteractionRepo::update_last_message(conn, &id, &message.text)?;
            reload(conn, &id)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        session_id: &str,
        status: InteractionStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> sanchar_core::errors::Result<Interaction> {
        let id = session_id.to_owned();
        let resolved_at = match status {
            InteractionStatus::Resolved => Some(resolved_at.unwrap_or_else(Utc::now)),
            _ => None,
        };
        self.blocking(move |conn| {
            require_changed(
                InteractionRepo::update_status(conn, &id, status, resolved_at)?,
                &id,
            )?;
            reload(conn, &id)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn set_contact_mode(
        &self,
        session_id: &str,
        mode: ContactMode,
    ) -> sanchar_core::errors::Result<Interaction> {
        let id = session_id.to_owned();
        self.blocking(move |conn| {
            require_changed(InteractionRepo::update_contact_mode(conn, &id, mode)?, &id)?;
            reload(conn, &id)
        })
        .await
    }
}

#[async_trait]
impl DirectoryLookup for SqliteStore {
    async fn find_user(&self, user_id: &str) -> sanchar_core::errors::Result<Option<UserProfile>> {
        let id = user_id.to_owned();
        self.blocking(move |conn| UserRepo::get(conn, &id)).await
    }

    async fn find_vehicle(
        &self,
        vehicle_id: &str,
    ) -> sanchar_core::errors::Result<Option<VehicleProfile>> {
        let id = vehicle_id.to_owned();
        self.blocking(move |conn| VehicleRepo::get(conn, &id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sanchar_core::{MessageKind, ScannerInfo};

    fn file_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sanchar.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store
            .insert_interaction(&Interaction::new(
                "int_1",
                "user_1",
                "veh_1",
                ScannerInfo::default(),
            ))
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn append_and_reload() {
        let (_dir, store) = file_store();
        let updated = store
            .append_message("int_1", Message::new(None, "scanner", "hi", MessageKind::Text))
            .await
            .unwrap();
        assert_eq!(updated.messages.len(), 1);
        assert_eq!(updated.last_message.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn append_to_missing_is_not_found() {
        let (_dir, store) = file_store();
        let err = store
            .append_message("ghost", Message::new(None, "scanner", "hi", MessageKind::Text))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::InteractionNotFound(_));
    }

    #[tokio::test]
    async fn resolve_then_reactivate() {
        let (_dir, store) = file_store();
        let resolved = store
            .set_status("int_1", InteractionStatus::Resolved, None)
            .await
            .unwrap();
        assert!(resolved.resolved_at.is_some());

        let active = store
            .set_status("int_1", InteractionStatus::Active, Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(active.status, InteractionStatus::Active);
        assert!(active.resolved_at.is_none());
    }

    #[tokio::test]
    async fn contact_mode_persists_across_reopen() {
        let (dir, store) = file_store();
        let _ = store.set_contact_mode("int_1", ContactMode::Call).await.unwrap();
        drop(store);

        let reopened = SqliteStore::open(dir.path().join("sanchar.db").to_str().unwrap()).unwrap();
        let loaded = reopened.find_by_id("int_1").await.unwrap().unwrap();
        assert_eq!(loaded.contact_mode, ContactMode::Call);
    }

    #[tokio::test]
    async fn set_status_on_missing_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .set_status("ghost", InteractionStatus::Ignored, None)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::InteractionNotFound(id) if id == "ghost");
    }

    #[tokio::test]
    async fn directory_lookups() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_user(&UserProfile {
                user_id: "user_1".into(),
                blocked_numbers: vec!["+910000000000".into()],
                ..UserProfile::default()
            })
            .unwrap();
        store
            .upsert_vehicle(&VehicleProfile {
                vehicle_id: "veh_1".into(),
                display_number: "DL3CAB0001".into(),
            })
            .unwrap();

        let user = store.find_user("user_1").await.unwrap().unwrap();
        assert!(user.has_blocked("+91 0000000000"));
        let vehicle = store.find_vehicle("veh_1").await.unwrap().unwrap();
        assert_eq!(vehicle.display_number, "DL3CAB0001");
    }
}
