//! The shared session-write guard.
//!
//! Every mutating event (chat, call, end) runs the same checks against a
//! freshly loaded interaction before touching the store.

use sanchar_core::constants::SCANNER_SENDER_ID;
use sanchar_core::{Interaction, UserProfile};

/// Who is writing into an interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Participant {
    /// The anonymous party who scanned the tag.
    Scanner,
    /// The vehicle owner.
    Owner,
}

impl Participant {
    /// Map a sender/caller ID onto a participant of `interaction`.
    pub fn resolve(sender_id: &str, interaction: &Interaction) -> Option<Self> {
        if sender_id == SCANNER_SENDER_ID {
            Some(Self::Scanner)
        } else if sender_id == interaction.user_id {
            Some(Self::Owner)
        } else {
            None
        }
    }
}

/// Outcome of [`check_write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteGuard {
    /// Write may proceed. `reactivate` is set when a closed interaction
    /// must first be flipped back to `active`.
    Allowed {
        /// Flip status to active before writing.
        reactivate: bool,
    },
    /// No such interaction.
    NotFound,
    /// Closed, and this participant may not reopen it.
    Closed,
    /// Scanner is blocked by the owner.
    Blocked,
}

/// Decide whether `participant` may write into `interaction`.
///
/// Only the scanner reopens a closed interaction. The block list is
/// consulted for scanner writes only; a missing owner profile blocks nobody.
pub fn check_write(
    interaction: Option<&Interaction>,
    participant: Participant,
    owner: Option<&UserProfile>,
) -> WriteGuard {
    let Some(interaction) = interaction else {
        return WriteGuard::NotFound;
    };

    let reactivate = !interaction.is_active();
    if reactivate && participant != Participant::Scanner {
        return WriteGuard::Closed;
    }

    if scanner_blocked(interaction, participant, owner) {
        return WriteGuard::Blocked;
    }

    WriteGuard::Allowed { reactivate }
}

/// Decide whether `participant` may resolve `interaction`.
///
/// Nobody reopens anything here: a closed interaction yields
/// [`WriteGuard::Closed`]. A blocked scanner may not end the session either.
pub fn check_end(
    interaction: Option<&Interaction>,
    participant: Participant,
    owner: Option<&UserProfile>,
) -> WriteGuard {
    let Some(interaction) = interaction else {
        return WriteGuard::NotFound;
    };
    if scanner_blocked(interaction, participant, owner) {
        return WriteGuard::Blocked;
    }
    if !interaction.is_active() {
        return WriteGuard::Closed;
    }
    WriteGuard::Allowed { reactivate: false }
}

fn scanner_blocked(
    interaction: &Interaction,
    participant: Participant,
    owner: Option<&UserProfile>,
) -> bool {
    if participant != Participant::Scanner {
        return false;
    }
    match (owner, interaction.scanner_contact()) {
        (Some(owner), Some(contact)) => owner.has_blocked(contact),
        _ => false,
    }
}
