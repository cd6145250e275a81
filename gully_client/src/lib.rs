//! `gully_client`
//!
//! Client-side systems:
//! - Connection management (welcome handshake, typed event senders)
//! - Local world replica rebuilt from server broadcasts
//! - Console command execution for the interactive binary

pub mod client;
pub mod view;

pub use client::{ClientState, GameClient};
