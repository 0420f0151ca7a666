//! Process-local store backed by `parking_lot` maps.
//!
//! Used by tests and by `sanchar --in-memory`. Every trait call clones out of
//! the map, so no lock is ever held across an `.await`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sanchar_core::errors::Result;
use sanchar_core::{
    ContactMode, DirectoryLookup, Interaction, InteractionStatus, Message, SessionStore,
    StoreError, UserProfile, VehicleProfile,
};

/// In-memory [`SessionStore`] and [`DirectoryLookup`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    interactions: RwLock<HashMap<String, Interaction>>,
    users: RwLock<HashMap<String, UserProfile>>,
    vehicles: RwLock<HashMap<String, VehicleProfile>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an interaction.
    pub fn insert_interaction(&self, interaction: Interaction) {
        let _ = self
            .interactions
            .write()
            .insert(interaction.interaction_id.clone(), interaction);
    }

    /// Insert or replace a user profile.
    pub fn upsert_user(&self, user: UserProfile) {
        let _ = self.users.write().insert(user.user_id.clone(), user);
    }

    /// Insert or replace a vehicle profile.
    pub fn upsert_vehicle(&self, vehicle: VehicleProfile) {
        let _ = self
            .vehicles
            .write()
            .insert(vehicle.vehicle_id.clone(), vehicle);
    }

    fn mutate(&self, session_id: &str, f: impl FnOnce(&mut Interaction)) -> Result<Interaction> {
        let mut map = self.interactions.write();
        let interaction = map
            .get_mut(session_id)
            .ok_or_else(|| StoreError::InteractionNotFound(session_id.to_owned()))?;
        f(interaction);
        Ok(interaction.clone())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Interaction>> {
        Ok(self.interactions.read().get(session_id).cloned())
    }

    async fn append_message(&self, session_id: &str, message: Message) -> Result<Interaction> {
        self.mutate(session_id, |i| i.push_message(message))
    }

    async fn set_status(
        &self,
        session_id: &str,
        status: InteractionStatus,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Interaction> {
        self.mutate(session_id, |i| i.set_status(status, resolved_at))
    }

    async fn set_contact_mode(&self, session_id: &str, mode: ContactMode) -> Result<Interaction> {
        self.mutate(session_id, |i| i.set_contact_mode(mode))
    }
}

#[async_trait]
impl DirectoryLookup for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn find_vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>> {
        Ok(self.vehicles.read().get(vehicle_id).cloned())
    }
}
