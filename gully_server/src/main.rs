//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p gully_server -- [--listen 127.0.0.1:43210] [--query 127.0.0.1:43211] [--config cfg.json]
//!
//! The server accepts persistent event-channel connections, applies every
//! inbound event to the authoritative world in arrival order, and
//! broadcasts the resulting deltas. A second listener answers read-only
//! HTTP queries (`/api/players`, `/api/vehicles`).
//!
//! Console commands:
//!   status    - uptime and entity counts
//!   players   - list current players
//!   vehicles  - list current vehicles
//!   quit      - shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use gully_server::server::{GameServer, ServerMessage};
use gully_shared::config::WorldConfig;
use tracing::info;

fn parse_args() -> anyhow::Result<WorldConfig> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = WorldConfig::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let text = std::fs::read_to_string(&args[i + 1])
                    .with_context(|| format!("read config {}", args[i + 1]))?;
                cfg = WorldConfig::from_json_str(&text).context("parse config")?;
                i += 2;
            }
            "--listen" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--query" if i + 1 < args.len() => {
                cfg.query_addr = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(listen = %cfg.listen_addr, query = %cfg.query_addr, "Starting server");

    let server = GameServer::bind(cfg).await.context("bind server")?;
    let local = server.local_addr()?;
    let query = server.query_local_addr()?;
    info!(%local, %query, "Server listening");

    // Console input feeds the worker queue so command output reflects a
    // consistent snapshot.
    let console_tx = server.command_sender();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(ServerMessage::Console(line)).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'players'/'vehicles' to list, 'quit' to exit.");
    println!();

    server.run().await
}
