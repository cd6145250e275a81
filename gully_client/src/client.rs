//! Client implementation.
//!
//! The client maintains:
//! - One persistent event connection (welcome handshake + all traffic),
//!   its receive half drained by a background task into an inbox
//! - A local world replica rebuilt from broadcasts
//! - Typed senders for every request the server understands
//! - Console command execution for the interactive binary

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use gully_shared::{
    config::WorldConfig,
    entity::{PlayerId, VehicleId},
    net::{ClientEvent, EventConn, EventReader, EventWriter, ServerEvent},
};
use tokio::{sync::mpsc, time};
use tracing::{debug, info, warn};

use crate::view::WorldView;

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Connection lost or closed.
    Disconnected,
    /// Welcomed by the server, not yet in the world.
    Connected,
    /// Join sent; world snapshots flow into the view.
    InWorld,
}

/// High-level game client.
pub struct GameClient {
    pub player_id: PlayerId,
    pub state: ClientState,
    pub view: WorldView,
    writer: EventWriter,
    inbox: mpsc::UnboundedReceiver<ServerEvent>,
    peer: SocketAddr,
}

impl GameClient {
    /// Connects to the server and waits for the welcome event.
    pub async fn connect(cfg: &WorldConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, "Connecting to server");
        let mut conn = EventConn::connect(server_addr).await?;
        let peer = conn.peer_addr()?;

        let welcome: ServerEvent = conn.recv().await.context("await welcome")?;
        let player_id = match welcome {
            ServerEvent::Welcome { player_id } => player_id,
            other => anyhow::bail!("expected welcome, got {other:?}"),
        };

        info!(player = %player_id, "Connected to server");

        let mut view = WorldView::new();
        view.apply(ServerEvent::Welcome { player_id });

        // The reader task owns the receive half; timed polling happens on
        // the inbox channel, never on a partially read frame.
        let (reader, writer) = conn.into_split();
        let (event_tx, inbox) = mpsc::unbounded_channel();
        tokio::spawn(read_loop(reader, event_tx));

        Ok(Self {
            player_id,
            state: ClientState::Connected,
            view,
            writer,
            inbox,
            peer,
        })
    }

    /// Enters the world under the given display name.
    pub async fn join(&mut self, name: &str) -> anyhow::Result<()> {
        self.writer
            .send(&ClientEvent::Join {
                name: name.to_string(),
            })
            .await?;
        self.state = ClientState::InWorld;
        info!(name = %name, "Join requested");
        Ok(())
    }

    pub async fn send_move(&mut self, x: f32, z: f32) -> anyhow::Result<()> {
        self.writer.send(&ClientEvent::Move { x, z }).await
    }

    pub async fn open_shop(&mut self) -> anyhow::Result<()> {
        self.writer.send(&ClientEvent::OpenShop).await
    }

    pub async fn buy_item(&mut self, item_id: &str) -> anyhow::Result<()> {
        self.writer
            .send(&ClientEvent::BuyItem {
                item_id: item_id.to_string(),
            })
            .await
    }

    pub async fn start_job(&mut self, job_type: &str) -> anyhow::Result<()> {
        self.writer
            .send(&ClientEvent::StartJob {
                job_type: job_type.to_string(),
            })
            .await
    }

    pub async fn enter_vehicle(&mut self, vehicle_id: VehicleId) -> anyhow::Result<()> {
        self.writer.send(&ClientEvent::EnterVehicle { vehicle_id }).await
    }

    pub async fn exit_vehicle(&mut self, vehicle_id: VehicleId) -> anyhow::Result<()> {
        self.writer.send(&ClientEvent::ExitVehicle { vehicle_id }).await
    }

    pub async fn drive_vehicle(
        &mut self,
        id: VehicleId,
        x: f32,
        z: f32,
        rot: f32,
    ) -> anyhow::Result<()> {
        self.writer
            .send(&ClientEvent::VehicleMove { id, x, z, rot })
            .await
    }

    pub async fn interact(&mut self) -> anyhow::Result<()> {
        self.writer.send(&ClientEvent::Interact).await
    }

    /// Applies every queued server event to the view, waiting at most
    /// a few milliseconds for the next one.
    pub async fn poll_events(&mut self) -> anyhow::Result<()> {
        loop {
            match time::timeout(Duration::from_millis(10), self.inbox.recv()).await {
                Ok(Some(event)) => self.view.apply(event),
                Ok(None) => {
                    if self.state != ClientState::Disconnected {
                        warn!("Connection to server lost");
                        self.state = ClientState::Disconnected;
                    }
                    return Ok(());
                }
                Err(_) => return Ok(()),
            }
        }
    }

    /// Executes one console command, returning lines to print.
    pub async fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "status" => {
                let mut out = Vec::new();
                out.push(format!("State: {:?}", self.state));
                out.push(format!("Player ID: {}", self.player_id));
                out.push(format!("Server: {}", self.server_peer()));
                if let Some(p) = self.view.own_player() {
                    out.push(format!(
                        "Position: ({:.1}, {:.1})  Balance: ${}",
                        p.pos.x, p.pos.z, p.money
                    ));
                    if let Some(seat) = &p.in_vehicle_id {
                        out.push(format!("Driving: {seat}"));
                    }
                }
                out.push(format!(
                    "World: {} player(s), {} vehicle(s)",
                    self.view.players().len(),
                    self.view.vehicles().len()
                ));
                Ok(out)
            }
            "who" => {
                let mut out = Vec::new();
                for p in self.view.players() {
                    let seat = match &p.in_vehicle_id {
                        Some(v) => format!(" [in {v}]"),
                        None => String::new(),
                    };
                    out.push(format!(
                        "  {} {} at ({:.1}, {:.1}) ${}{}",
                        p.id, p.name, p.pos.x, p.pos.z, p.money, seat
                    ));
                }
                Ok(out)
            }
            "vehicles" => {
                let mut out = Vec::new();
                for v in self.view.vehicles() {
                    let owner = match v.owner_id {
                        Some(p) => format!("owner {p}"),
                        None => "free".to_string(),
                    };
                    out.push(format!(
                        "  {} at ({:.1}, {:.1}) rot {:.2} {}",
                        v.id, v.pos.x, v.pos.z, v.rot, owner
                    ));
                }
                Ok(out)
            }
            "move" => {
                let parsed = (
                    tokens.get(1).and_then(|t| t.parse::<f32>().ok()),
                    tokens.get(2).and_then(|t| t.parse::<f32>().ok()),
                );
                let (Some(x), Some(z)) = parsed else {
                    return Ok(vec!["Usage: move <x> <z>".to_string()]);
                };
                self.send_move(x, z).await?;
                Ok(vec![])
            }
            "shop" => {
                self.open_shop().await?;
                Ok(vec![])
            }
            "buy" => {
                if tokens.len() < 2 {
                    return Ok(vec!["Usage: buy <itemId>".to_string()]);
                }
                self.buy_item(tokens[1]).await?;
                Ok(vec![])
            }
            "job" => {
                let job_type = tokens.get(1).copied().unwrap_or("delivery");
                self.start_job(job_type).await?;
                Ok(vec![])
            }
            "enter" => {
                if tokens.len() < 2 {
                    return Ok(vec!["Usage: enter <vehicleId>".to_string()]);
                }
                self.enter_vehicle(VehicleId::new(tokens[1])).await?;
                Ok(vec![])
            }
            "exit" => {
                let seat = match tokens.get(1) {
                    Some(id) => Some(VehicleId::new(*id)),
                    None => self.view.own_player().and_then(|p| p.in_vehicle_id.clone()),
                };
                let Some(id) = seat else {
                    return Ok(vec!["Not driving".to_string()]);
                };
                self.exit_vehicle(id).await?;
                Ok(vec![])
            }
            "drive" => {
                let parsed = (
                    tokens.get(1).and_then(|t| t.parse::<f32>().ok()),
                    tokens.get(2).and_then(|t| t.parse::<f32>().ok()),
                    tokens.get(3).and_then(|t| t.parse::<f32>().ok()),
                );
                let (Some(x), Some(z), Some(rot)) = parsed else {
                    return Ok(vec!["Usage: drive <x> <z> <rot>".to_string()]);
                };
                let seat = self.view.own_player().and_then(|p| p.in_vehicle_id.clone());
                let Some(id) = seat else {
                    return Ok(vec!["Not driving".to_string()]);
                };
                self.drive_vehicle(id, x, z, rot).await?;
                Ok(vec![])
            }
            "interact" => {
                self.interact().await?;
                Ok(vec![])
            }
            "quit" => {
                std::process::exit(0);
            }
            _ => Ok(vec![format!("Unknown command: {}", tokens[0])]),
        }
    }

    /// Returns the server address of the underlying connection.
    pub fn server_peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Forwards server events into the inbox until the connection dies; the
/// dropped sender is how the poll loop learns the stream is gone.
async fn read_loop(mut reader: EventReader, tx: mpsc::UnboundedSender<ServerEvent>) {
    loop {
        match reader.recv::<ServerEvent>().await {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "Server connection closed");
                return;
            }
        }
    }
}
