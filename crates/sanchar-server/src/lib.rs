//! # sanchar-server
//!
//! Axum HTTP + `WebSocket` gateway for the scanner-to-owner relay.
//!
//! - [`websocket`]: connection state, typed broadcast groups, wire protocol,
//!   per-connection session loop with heartbeat
//! - [`relay`]: session relay engine, shared write guard, pending call buffer,
//!   per-session serialization
//! - [`push`]: Expo push dispatcher
//! - [`server`]: router, `/health`, `/metrics`, connection cap, background sweeper
//! - [`shutdown`]: graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod push;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use relay::RelayEngine;
pub use server::{RunningServer, SancharServer};
