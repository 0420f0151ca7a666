//! Session relay: state machine, write guard, call buffer, per-session locks.

pub mod engine;
pub mod errors;
pub mod guard;
pub mod locks;
pub mod pending;

pub use engine::{RelayEngine, RelayOptions};
pub use errors::RelayError;
pub use guard::{Participant, WriteGuard, check_end, check_write};
pub use pending::{PendingCall, PendingCallBuffer, spawn_sweeper};
