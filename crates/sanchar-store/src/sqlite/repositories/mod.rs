//! Stateless repositories. Every method takes `&Connection`.

pub mod interaction;
pub mod message;
pub mod user;
pub mod vehicle;

pub use interaction::InteractionRepo;
pub use message::MessageRepo;
pub use user::UserRepo;
pub use vehicle::VehicleRepo;

use chrono::{DateTime, Utc};

use crate::errors::{Result, SqliteStoreError};

pub(crate) fn parse_time(column: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SqliteStoreError::Corrupt {
            column,
            reason: format!("{raw}: {e}"),
        })
}

pub(crate) fn parse_enum<T>(column: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| SqliteStoreError::Corrupt {
        column,
        reason: e.to_string(),
    })
}
