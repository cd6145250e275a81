//! `gully_server`
//!
//! Server-side systems:
//! - Event-channel accept loop and per-connection reader/writer tasks
//! - Single dispatch worker applying events in arrival order
//! - Deferred job timers fed back through the worker queue
//! - Read-only HTTP query listener
//!
//! Networking model:
//! - TCP event channel: all gameplay events, both directions
//! - TCP query listener: HTTP GET snapshots, no writes

pub mod query;
pub mod server;

pub use server::GameServer;
