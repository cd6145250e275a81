//! Configuration system.
//!
//! Loads configuration from JSON strings/files (file IO left to the
//! binaries). Every field has a default so an empty `{}` is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Event-channel listen address, e.g. `127.0.0.1:43210`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Read-only HTTP query listen address.
    #[serde(default = "default_query_addr")]
    pub query_addr: String,
    /// Server address the client connects to.
    #[serde(default = "default_listen_addr")]
    pub server_addr: String,
    /// Player display name (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:43210".to_string()
}

fn default_query_addr() -> String {
    "127.0.0.1:43211".to_string()
}

fn default_player_name() -> String {
    "Guest".to_string()
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            query_addr: default_query_addr(),
            server_addr: default_listen_addr(),
            player_name: default_player_name(),
        }
    }
}

impl WorldConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
