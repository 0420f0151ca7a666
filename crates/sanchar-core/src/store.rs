//! Contracts the relay consumes from the durable store and the user directory.
//!
//! Both are addressed by opaque string identifiers. Implementations may block
//! on I/O; callers must not hold in-process locks across these calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::directory::{UserProfile, VehicleProfile};
use crate::errors::Result;
use crate::interaction::{ContactMode, Interaction, InteractionStatus, Message};

/// Durable interaction records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load an interaction, or `None` if it does not exist.
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Interaction>>;

    /// Append a message to the log and update `last_message`.
    async fn append_message(&self, session_id: &str, message: Message) -> Result<Interaction>;

    /// Set the status. `resolved_at` is kept only for `Resolved`.
    async fn set_status(
        &self,
        session_id: &str,
        status: InteractionStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Interaction>;

    /// Set the contact mode.
    async fn set_contact_mode(&self, session_id: &str, mode: ContactMode) -> Result<Interaction>;
}

/// Read-only user and vehicle directory.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolve a user's push token, preferences, and block list.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Resolve a vehicle's display number.
    async fn find_vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>>;
}
