//! # sanchar-core
//!
//! Foundation types shared by every Sanchar crate.
//!
//! - Interaction (session) records, messages, and lifecycle enums
//! - Directory records: owner profiles, notification preferences, vehicles
//! - The narrow `SessionStore` / `DirectoryLookup` contracts the relay calls
//! - Branded ID newtypes and relay-wide constants
//! - `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod constants;
pub mod directory;
pub mod errors;
pub mod ids;
pub mod interaction;
pub mod logging;
pub mod store;

pub use directory::{NotificationPreferences, UserProfile, VehicleProfile};
pub use errors::StoreError;
pub use ids::{ConnectionId, MessageId};
pub use interaction::{
    ContactMode, Interaction, InteractionStatus, Message, MessageKind, ScannerInfo,
};
pub use store::{DirectoryLookup, SessionStore};
