//! `SQLite` backend.
//!
//! - **[`connection`]**: `r2d2` pool with pragmas applied to every connection.
//! - **[`migrations`]**: embedded, version-tracked schema.
//! - **[`repositories`]**: stateless repos, every method takes `&Connection`.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory, verify_pragmas,
};
pub use migrations::{current_version, latest_version, run_migrations};
