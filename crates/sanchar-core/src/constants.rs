//! Relay-wide constants.

use std::time::Duration;

/// Sender ID used by the anonymous party who scanned the vehicle tag.
pub const SCANNER_SENDER_ID: &str = "scanner";

/// How long a buffered call invitation stays deliverable.
pub const PENDING_CALL_TTL: Duration = Duration::from_secs(30);

/// Text recorded in the message log when a call is placed.
pub const CALL_STARTED_TEXT: &str = "Voice call started";
