//! Session relay engine.
//!
//! Validates each inbound event against the interaction's current state,
//! persists through the [`SessionStore`], fans out through the
//! [`GroupRegistry`], and fires push or call-buffer side effects.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sanchar_core::constants::{CALL_STARTED_TEXT, PENDING_CALL_TTL};
use sanchar_core::{
    ConnectionId, ContactMode, DirectoryLookup, Interaction, InteractionStatus, Message,
    MessageKind, SessionStore, UserProfile,
};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::errors::{RelayError, Result};
use super::guard::{Participant, WriteGuard, check_end, check_write};
use super::locks::SessionLocks;
use super::pending::{PendingCall, PendingCallBuffer};
use crate::metrics::{
    PENDING_CALLS_DELIVERED_TOTAL, PUSH_SENDS_TOTAL, RELAY_EVENTS_TOTAL, RELAY_REJECTIONS_TOTAL,
};
use crate::push::PushDispatcher;
use crate::websocket::groups::{GroupKey, GroupRegistry};
use crate::websocket::protocol::{
    AnswerCall, ClientEvent, EndCall, EndSession, IceCandidate, OutboundEvent, PeerTarget,
    SendMessage, StartCall,
};

/// Longest chat preview placed in a push body.
const PUSH_PREVIEW_CHARS: usize = 120;

/// Relay behaviour switches.
#[derive(Clone, Copy, Debug)]
pub struct RelayOptions {
    /// Push only when the recipient's user group is empty.
    pub push_only_when_offline: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            push_only_when_offline: true,
        }
    }
}

/// An interaction that passed the write guard.
struct Admitted {
    interaction: Interaction,
    participant: Participant,
    owner: Option<UserProfile>,
    reactivate: bool,
}

enum PushKind {
    Chat { text: String },
    Call { caller_name: Option<String> },
}

/// The session relay state machine.
pub struct RelayEngine {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn DirectoryLookup>,
    groups: Arc<GroupRegistry>,
    pending: Arc<PendingCallBuffer>,
    push: Arc<dyn PushDispatcher>,
    locks: SessionLocks,
    options: RelayOptions,
}

impl RelayEngine {
    /// Wire an engine with a fresh group registry and call buffer.
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn DirectoryLookup>,
        push: Arc<dyn PushDispatcher>,
        options: RelayOptions,
    ) -> Self {
        Self::with_parts(
            store,
            directory,
            push,
            Arc::new(GroupRegistry::new()),
            Arc::new(PendingCallBuffer::new(PENDING_CALL_TTL)),
            options,
        )
    }

    /// Wire an engine around an existing registry and call buffer.
    pub fn with_parts(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn DirectoryLookup>,
        push: Arc<dyn PushDispatcher>,
        groups: Arc<GroupRegistry>,
        pending: Arc<PendingCallBuffer>,
        options: RelayOptions,
    ) -> Self {
        Self {
            store,
            directory,
            groups,
            pending,
            push,
            locks: SessionLocks::new(),
            options,
        }
    }

    /// The group registry.
    pub fn groups(&self) -> &Arc<GroupRegistry> {
        &self.groups
    }

    /// The pending call buffer.
    pub fn pending(&self) -> &Arc<PendingCallBuffer> {
        &self.pending
    }

    /// Dispatch one parsed event from `conn_id`. Rejections go back to that
    /// connection only.
    pub async fn handle(&self, conn_id: &ConnectionId, event: ClientEvent) {
        let name = event.name();
        counter!(RELAY_EVENTS_TOTAL, "event" => name).increment(1);

        let result = match event {
            ClientEvent::JoinUserRoom(p) => {
                self.join_user_room(conn_id, &p.user_id);
                Ok(())
            }
            ClientEvent::LeaveUserRoom(p) => {
                let _ = self.groups.leave(conn_id, &GroupKey::user(p.user_id));
                Ok(())
            }
            ClientEvent::JoinRoom(p) => {
                let _ = self.groups.join(conn_id, GroupKey::session(p.session_id));
                Ok(())
            }
            ClientEvent::LeaveRoom(p) => {
                let _ = self.groups.leave(conn_id, &GroupKey::session(p.session_id));
                Ok(())
            }
            ClientEvent::SendMessage(p) => self.send_message(p).await,
            ClientEvent::StartCall(p) => self.start_call(conn_id, p).await,
            ClientEvent::AnswerCall(p) => {
                self.answer_call(conn_id, p);
                Ok(())
            }
            ClientEvent::IceCandidate(p) => {
                self.ice_candidate(conn_id, p);
                Ok(())
            }
            ClientEvent::EndCall(p) => {
                self.end_call(conn_id, p);
                Ok(())
            }
            ClientEvent::EndSession(p) => self.end_session(p).await,
        };

        if let Err(err) = result {
            self.reject(conn_id, name, &err);
        }
    }

    /// Send an `error` event to one connection.
    pub fn reject(&self, conn_id: &ConnectionId, event: &str, err: &RelayError) {
        let code = err.code();
        counter!(RELAY_REJECTIONS_TOTAL, "code" => code).increment(1);
        match err {
            RelayError::Store(source) => {
                warn!(conn_id = %conn_id, event, error = %source, "store failure, event dropped");
            }
            _ => debug!(conn_id = %conn_id, event, code, reason = %err, "event rejected"),
        }
        let _ = self
            .groups
            .send_to(conn_id, &OutboundEvent::error(code, err.to_string(), event));
    }

    /// Join the user's group and replay a buffered call, if one is still live.
    pub fn join_user_room(&self, conn_id: &ConnectionId, user_id: &str) {
        let _ = self.groups.join(conn_id, GroupKey::user(user_id));
        if let Some(call) = self.pending.take(user_id, Instant::now()) {
            info!(conn_id = %conn_id, user_id, "delivering pending call");
            counter!(PENDING_CALLS_DELIVERED_TOTAL).increment(1);
            let _ = self.groups.send_to(
                conn_id,
                &OutboundEvent::new("callMade", call.call_made_payload()),
            );
        }
    }

    /// Drop every membership of a closing connection.
    pub fn disconnect(&self, conn_id: &ConnectionId) {
        let left = self.groups.unregister(conn_id);
        debug!(conn_id = %conn_id, groups = left.len(), "connection left all groups");
    }

    /// Load an interaction and resolve who is writing into it.
    async fn load_participant(
        &self,
        session_id: &str,
        sender_id: &str,
    ) -> Result<(Interaction, Participant, Option<UserProfile>)> {
        let Some(interaction) = self.store.find_by_id(session_id).await? else {
            return Err(RelayError::NotFound(session_id.to_owned()));
        };
        let participant = Participant::resolve(sender_id, &interaction).ok_or_else(|| {
            RelayError::InvalidParams(format!(
                "{sender_id} is not a participant of interaction {session_id}"
            ))
        })?;
        let owner = match participant {
            Participant::Scanner => self.directory.find_user(&interaction.user_id).await?,
            Participant::Owner => None,
        };
        Ok((interaction, participant, owner))
    }

    /// Load an interaction and run the shared write guard.
    async fn admit(&self, session_id: &str, sender_id: &str) -> Result<Admitted> {
        let (interaction, participant, owner) =
            self.load_participant(session_id, sender_id).await?;

        match check_write(Some(&interaction), participant, owner.as_ref()) {
            WriteGuard::Allowed { reactivate } => Ok(Admitted {
                interaction,
                participant,
                owner,
                reactivate,
            }),
            WriteGuard::NotFound => Err(RelayError::NotFound(session_id.to_owned())),
            WriteGuard::Closed => Err(RelayError::SessionClosed(session_id.to_owned())),
            WriteGuard::Blocked => Err(RelayError::Blocked),
        }
    }

    /// Persist a reactivation, a contact-mode change, and one appended message.
    ///
    /// If any step fails the earlier steps are rolled back, so a failed event
    /// leaves the interaction as it was and nothing is broadcast.
    async fn persist(
        &self,
        original: &Interaction,
        reactivate: bool,
        mode: Option<ContactMode>,
        message: Message,
    ) -> Result<Interaction> {
        let id = original.interaction_id.as_str();
        let staged = async {
            if reactivate {
                let _ = self
                    .store
                    .set_status(id, InteractionStatus::Active, None)
                    .await?;
            }
            if let Some(mode) = mode {
                let _ = self.store.set_contact_mode(id, mode).await?;
            }
            self.store.append_message(id, message).await
        }
        .await;

        match staged {
            Ok(updated) => {
                if reactivate {
                    info!(session_id = id, "interaction reactivated by scanner");
                }
                Ok(updated)
            }
            Err(e) => {
                warn!(session_id = id, error = %e, "write failed, rolling back");
                self.restore(original, reactivate, mode.is_some()).await;
                Err(e.into())
            }
        }
    }

    async fn restore(&self, original: &Interaction, status: bool, mode: bool) {
        let id = original.interaction_id.as_str();
        if status {
            if let Err(e) = self
                .store
                .set_status(id, original.status, original.resolved_at)
                .await
            {
                warn!(session_id = id, error = %e, "status rollback failed");
            }
        }
        if mode {
            if let Err(e) = self.store.set_contact_mode(id, original.contact_mode).await {
                warn!(session_id = id, error = %e, "contact mode rollback failed");
            }
        }
    }

    /// Append a chat message, then fan it out.
    #[instrument(skip_all, fields(session_id = %p.session_id, sender = %p.sender_id))]
    pub async fn send_message(&self, p: SendMessage) -> Result<()> {
        let _guard = self.locks.lock(&p.session_id).await;
        let admitted = self.admit(&p.session_id, &p.sender_id).await?;
        let session_id = p.session_id.as_str();

        let first_contact = admitted.interaction.messages.is_empty()
            && admitted.interaction.contact_mode == ContactMode::Scan;
        let message = Message::new(p.message_id, p.sender_id, p.text, MessageKind::Text);
        let updated = self
            .persist(
                &admitted.interaction,
                admitted.reactivate,
                first_contact.then_some(ContactMode::Chat),
                message.clone(),
            )
            .await?;

        let session = GroupKey::session(session_id);
        if admitted.reactivate {
            let _ = self.groups.broadcast(&session, &status_update(&updated));
        }
        let _ = self.groups.broadcast(
            &session,
            &OutboundEvent::new("receive_message", receive_message(session_id, &message)),
        );
        let _ = self.groups.broadcast(
            &GroupKey::user(&updated.user_id),
            &OutboundEvent::new("interaction_update", summary(&updated, Some(&message))),
        );

        if let (Participant::Scanner, Some(owner)) = (admitted.participant, admitted.owner) {
            self.notify(
                &owner,
                &updated,
                PushKind::Chat {
                    text: message.text,
                },
            );
        }
        Ok(())
    }

    /// Ring a user, buffer the invitation, and log the call on the interaction.
    #[instrument(skip_all, fields(callee = %p.target_user_id, caller = %p.caller_id))]
    pub async fn start_call(&self, conn_id: &ConnectionId, p: StartCall) -> Result<()> {
        let _guard = match &p.session_id {
            Some(id) => Some(self.locks.lock(id).await),
            None => None,
        };

        let mut session = None;
        if let Some(session_id) = &p.session_id {
            let admitted = self.admit(session_id, &p.caller_id).await?;
            let message = Message::new(
                None,
                p.caller_id.clone(),
                CALL_STARTED_TEXT,
                MessageKind::Call,
            );
            let updated = self
                .persist(
                    &admitted.interaction,
                    admitted.reactivate,
                    Some(ContactMode::Call),
                    message.clone(),
                )
                .await?;
            if admitted.reactivate {
                let _ = self
                    .groups
                    .broadcast(&GroupKey::session(session_id), &status_update(&updated));
            }
            let _ = self.groups.broadcast(
                &GroupKey::user(&p.target_user_id),
                &OutboundEvent::new("interaction_update", summary(&updated, None)),
            );
            session = Some((updated, message));
        }

        let call = PendingCall {
            signal: p.signal,
            caller_id: p.caller_id.clone(),
            caller_name: p.caller_name.clone(),
            session_id: p.session_id.clone(),
            from: conn_id.clone(),
            created_at: Instant::now(),
        };
        let target = GroupKey::user(&p.target_user_id);
        let live = self
            .groups
            .broadcast(&target, &OutboundEvent::new("callMade", call.call_made_payload()));
        let replaced = self.pending.put(&p.target_user_id, call);
        debug!(live, replaced, "call invitation sent and buffered");

        match self.directory.find_user(&p.target_user_id).await {
            Ok(Some(callee)) => {
                if let Some((interaction, _)) = &session {
                    self.notify(
                        &callee,
                        interaction,
                        PushKind::Call {
                            caller_name: p.caller_name,
                        },
                    );
                } else {
                    self.notify_without_session(&callee, p.caller_name);
                }
            }
            Ok(None) => debug!("call target has no directory entry, skipping push"),
            Err(e) => warn!(error = %e, "directory lookup failed, skipping call push"),
        }

        if let Some((interaction, message)) = session {
            let _ = self.groups.broadcast(
                &GroupKey::session(&interaction.interaction_id),
                &OutboundEvent::new(
                    "receive_message",
                    receive_message(&interaction.interaction_id, &message),
                ),
            );
        }
        Ok(())
    }

    /// Forward the callee's answer and stop the call from ringing again.
    pub fn answer_call(&self, conn_id: &ConnectionId, p: AnswerCall) {
        let delivered = self.deliver_to(
            &p.to,
            &OutboundEvent::new("callAccepted", json!({ "signal": p.signal, "from": conn_id })),
        );
        let cleared = self.clear_pending_for(conn_id);
        debug!(to = %p.to, delivered, cleared, "call answered");
    }

    /// Pure relay of an ICE candidate.
    pub fn ice_candidate(&self, conn_id: &ConnectionId, p: IceCandidate) {
        let _ = self.deliver_to(
            &p.to,
            &OutboundEvent::new(
                "iceCandidate",
                json!({ "candidate": p.candidate, "from": conn_id }),
            ),
        );
    }

    /// Tell the peer the call ended and cancel buffered invitations on both
    /// sides: the addressed user's, and any for the user groups of the
    /// connection hanging up (a declined call must not ring on reconnect).
    ///
    /// The interaction's status is left untouched.
    pub fn end_call(&self, conn_id: &ConnectionId, p: EndCall) {
        let delivered = self.deliver_to(
            &p.to,
            &OutboundEvent::new(
                "callEnded",
                json!({ "from": conn_id, "sessionId": p.session_id }),
            ),
        );
        let mut cancelled = self.clear_pending_for(conn_id);
        if let PeerTarget::User { user_id } = &p.to {
            cancelled += usize::from(self.pending.remove(user_id));
        }
        debug!(to = %p.to, delivered, cancelled, "call ended");
    }

    /// Resolve an active interaction. Already-closed interactions are left alone.
    #[instrument(skip_all, fields(session_id = %p.session_id, ended_by = %p.ended_by))]
    pub async fn end_session(&self, p: EndSession) -> Result<()> {
        let _guard = self.locks.lock(&p.session_id).await;
        let (interaction, participant, owner) =
            self.load_participant(&p.session_id, &p.ended_by).await?;
        match check_end(Some(&interaction), participant, owner.as_ref()) {
            WriteGuard::Allowed { .. } => {}
            WriteGuard::Closed => {
                debug!(status = %interaction.status, "end_session on closed interaction ignored");
                return Ok(());
            }
            WriteGuard::NotFound => return Err(RelayError::NotFound(p.session_id)),
            WriteGuard::Blocked => return Err(RelayError::Blocked),
        }

        let updated = self
            .store
            .set_status(&p.session_id, InteractionStatus::Resolved, Some(Utc::now()))
            .await?;
        info!("interaction resolved");

        let session = GroupKey::session(&p.session_id);
        let _ = self.groups.broadcast(
            &session,
            &OutboundEvent::new(
                "session_ended",
                json!({
                    "interactionId": updated.interaction_id,
                    "endedBy": p.ended_by,
                    "resolvedAt": updated.resolved_at,
                }),
            ),
        );
        let _ = self.groups.broadcast(&session, &status_update(&updated));
        let _ = self.groups.broadcast(
            &GroupKey::user(&updated.user_id),
            &OutboundEvent::new("interaction_update", summary(&updated, None)),
        );
        Ok(())
    }

    fn deliver_to(&self, to: &PeerTarget, event: &OutboundEvent) -> usize {
        match to {
            PeerTarget::Connection(conn_id) => usize::from(self.groups.send_to(conn_id, event)),
            PeerTarget::User { user_id } => self.groups.broadcast(&GroupKey::user(user_id), event),
        }
    }

    /// Drop buffered calls for every user group `conn_id` has joined.
    fn clear_pending_for(&self, conn_id: &ConnectionId) -> usize {
        let mut cleared = 0;
        for key in self.groups.groups_of(conn_id) {
            if let GroupKey::User(user_id) = key {
                if self.pending.remove(&user_id) {
                    debug!(user_id = %user_id, "pending call cleared");
                    cleared += 1;
                }
            }
        }
        cleared
    }

    fn should_push(&self, recipient: &UserProfile, allowed: bool) -> Option<String> {
        if !allowed {
            return None;
        }
        if self.options.push_only_when_offline
            && self.groups.has_members(&GroupKey::user(&recipient.user_id))
        {
            debug!(user_id = %recipient.user_id, "recipient online, skipping push");
            return None;
        }
        recipient.push_token.clone()
    }

    /// Fire-and-forget push about an interaction. Never fails the caller.
    fn notify(&self, recipient: &UserProfile, interaction: &Interaction, kind: PushKind) {
        let prefs = recipient.notification_preferences;
        let allowed = match kind {
            PushKind::Chat { .. } => prefs.allows_chat(),
            PushKind::Call { .. } => prefs.allows_calls(),
        };
        let Some(token) = self.should_push(recipient, allowed) else {
            return;
        };

        let push = Arc::clone(&self.push);
        let directory = Arc::clone(&self.directory);
        let interaction_id = interaction.interaction_id.clone();
        let vehicle_id = interaction.vehicle_id.clone();
        drop(tokio::spawn(async move {
            let plate = match directory.find_vehicle(&vehicle_id).await {
                Ok(vehicle) => vehicle.map(|v| v.display_number),
                Err(e) => {
                    warn!(error = %e, vehicle_id = %vehicle_id, "vehicle lookup failed for push");
                    None
                }
            };
            let (title, body, data) = match kind {
                PushKind::Chat { text } => (
                    plate.map_or_else(
                        || "New message".to_owned(),
                        |p| format!("New message about {p}"),
                    ),
                    preview(&text),
                    json!({ "type": "chat", "interactionId": interaction_id }),
                ),
                PushKind::Call { caller_name } => (
                    "Incoming call".to_owned(),
                    call_body(caller_name.as_deref(), plate.as_deref()),
                    json!({ "type": "call", "interactionId": interaction_id }),
                ),
            };
            record_push(&push.send(&token, &title, &body, data).await);
        }));
    }

    fn notify_without_session(&self, recipient: &UserProfile, caller_name: Option<String>) {
        let Some(token) = self.should_push(recipient, recipient.notification_preferences.allows_calls())
        else {
            return;
        };
        let push = Arc::clone(&self.push);
        drop(tokio::spawn(async move {
            let body = call_body(caller_name.as_deref(), None);
            record_push(
                &push
                    .send(&token, "Incoming call", &body, json!({ "type": "call" }))
                    .await,
            );
        }));
    }
}

fn record_push(outcome: &crate::push::PushOutcome) {
    let label = if outcome.success { "ok" } else { "failed" };
    counter!(PUSH_SENDS_TOTAL, "outcome" => label).increment(1);
    if !outcome.success {
        warn!(error = ?outcome.error, "push not delivered");
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PUSH_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

fn call_body(caller_name: Option<&str>, plate: Option<&str>) -> String {
    let who = caller_name.unwrap_or("Someone");
    match plate {
        Some(plate) => format!("{who} is calling about {plate}"),
        None => format!("{who} is calling you"),
    }
}

fn receive_message(session_id: &str, message: &Message) -> Value {
    json!({ "interactionId": session_id, "message": message })
}

fn status_update(interaction: &Interaction) -> OutboundEvent {
    OutboundEvent::new(
        "status_update",
        json!({
            "interactionId": interaction.interaction_id,
            "status": interaction.status,
            "resolvedAt": interaction.resolved_at,
        }),
    )
}

/// Compact list-view summary sent to a user group.
fn summary(interaction: &Interaction, message: Option<&Message>) -> Value {
    let mut value = json!({
        "interactionId": interaction.interaction_id,
        "contactType": interaction.contact_mode,
        "lastMessage": interaction.last_message,
        "status": interaction.status,
        "resolvedAt": interaction.resolved_at,
    });
    if let Some(message) = message {
        value["message"] = json!(message);
    }
    value
}
