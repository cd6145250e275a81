//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p gully_client -- [--addr 127.0.0.1:43210] [--name Ada]
//!
//! The client connects to the server, joins the world, and mirrors every
//! broadcast into a local replica you can inspect from the console.
//!
//! Console commands:
//!   status              - Show connection and world summary
//!   who                 - List players in the world
//!   vehicles            - List vehicles and their owners
//!   move <x> <z>        - Walk to a position
//!   shop                - Request the shop catalog
//!   buy <itemId>        - Purchase a catalog item
//!   job [type]          - Start a job (default: delivery)
//!   enter <vehicleId>   - Enter a free vehicle
//!   exit [vehicleId]    - Leave the current vehicle
//!   drive <x> <z> <rot> - Move the vehicle you are driving
//!   interact            - Poke the world
//!   quit                - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use gully_client::client::{ClientState, GameClient};
use gully_shared::config::WorldConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> WorldConfig {
    let mut cfg = WorldConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    client.join(&cfg.player_name).await.context("join")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
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
            if !line.is_empty() {
                if console_tx.blocking_send(line).is_err() {
                    break;
                }
            }
        }
    });

    println!("Joined as {}. Type 'status' for info, 'quit' to exit.", cfg.player_name);
    println!();

    let poll_interval = Duration::from_millis(50);

    loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match client.exec_console(&line).await {
                Ok(output) => {
                    for line in output {
                        println!("{}", line);
                    }
                }
                Err(e) => {
                    println!("Error: {}", e);
                }
            }
        }

        // Fold pending broadcasts into the replica.
        client.poll_events().await?;
        for line in client.view.drain_notices() {
            println!("{}", line);
        }

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
