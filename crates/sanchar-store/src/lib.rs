//! # sanchar-store
//!
//! Implementations of the [`SessionStore`](sanchar_core::SessionStore) and
//! [`DirectoryLookup`](sanchar_core::DirectoryLookup) contracts.
//!
//! - [`MemoryStore`]: process-local maps, used by tests and `--in-memory` runs
//! - [`SqliteStore`]: `rusqlite` + `r2d2` pool with embedded migrations
//!
//! Both expose seeding helpers (`insert_interaction`, `upsert_user`,
//! `upsert_vehicle`). Interaction CRUD and archival belong to the HTTP API
//! that owns the records, not to the relay.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use errors::SqliteStoreError;
pub use memory::MemoryStore;
pub use sqlite::{ConnectionConfig, ConnectionPool, new_file, new_in_memory, run_migrations};
pub use store::SqliteStore;
