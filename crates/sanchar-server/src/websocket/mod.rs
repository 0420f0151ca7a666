//! `WebSocket` connection state, wire protocol, groups, and the session loop.

pub mod connection;
pub mod groups;
pub mod handler;
pub mod protocol;
pub mod session;
