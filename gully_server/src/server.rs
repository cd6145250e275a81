//! Server implementation.
//!
//! An authoritative event-driven server. It supports:
//! - Persistent event-channel connections (length-prefixed JSON over TCP)
//! - A single dispatch worker that applies events in arrival order
//! - Deferred job timers re-enqueued through the worker queue
//! - Read-only HTTP queries answered between events
//! - Console commands (status, players, vehicles, quit)
//!
//! Ordering notes:
//! - Every state mutation happens on the worker while it processes one
//!   `ServerMessage`, so the store never needs a lock.
//! - A connection's `Connected` message is queued before its reader task
//!   starts, so `welcome` always precedes the connection's own events.
//! - Broadcasts for one triggering event are delivered in the order the
//!   router planned them.

use anyhow::Context;
use gully_shared::{
    catalog::Catalog,
    config::WorldConfig,
    entity::PlayerId,
    net::{ClientEvent, EventListener, EventReader, EventWriter, ServerEvent},
    router::{Audience, Dispatch, EventRouter, OutboundEvent},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::query::{QueryKind, QueryListener, QueryRequest};

/// Messages feeding the single dispatch worker. Everything that reads or
/// mutates world state arrives here, in order.
#[derive(Debug)]
pub enum ServerMessage {
    /// A connection was accepted; `tx` is its outbound event channel.
    Connected {
        id: PlayerId,
        tx: mpsc::UnboundedSender<ServerEvent>,
    },
    /// A connection sent an event.
    Inbound { id: PlayerId, event: ClientEvent },
    /// A connection closed (EOF, I/O error, or malformed frame).
    Disconnected { id: PlayerId },
    /// A job timer elapsed.
    JobElapsed { player: PlayerId, job: u64 },
    /// A read-only snapshot request from the query listener.
    Query(QueryRequest),
    /// A console line from stdin.
    Console(String),
}

/// Game server: listeners plus the worker state behind one message queue.
pub struct GameServer {
    pub cfg: WorldConfig,
    router: EventRouter,
    clients: HashMap<PlayerId, mpsc::UnboundedSender<ServerEvent>>,
    listener: EventListener,
    query: QueryListener,
    msg_tx: mpsc::UnboundedSender<ServerMessage>,
    msg_rx: mpsc::UnboundedReceiver<ServerMessage>,
    started: Instant,
}

impl GameServer {
    /// Binds both listeners. The config is updated with the actual bound
    /// addresses, so `:0` works for tests.
    pub async fn bind(mut cfg: WorldConfig) -> anyhow::Result<Self> {
        let listen: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let query_addr: SocketAddr = cfg.query_addr.parse().context("parse query_addr")?;
        let listener = EventListener::bind(listen).await?;
        let query = QueryListener::bind(query_addr).await?;
        cfg.listen_addr = listener.local_addr()?.to_string();
        cfg.query_addr = query.local_addr()?.to_string();
        cfg.server_addr = cfg.listen_addr.clone();

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Ok(Self {
            cfg,
            router: EventRouter::new(Catalog::standard()),
            clients: HashMap::new(),
            listener,
            query,
            msg_tx,
            msg_rx,
            started: Instant::now(),
        })
    }

    /// Event-channel address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Query-interface address (after binding).
    pub fn query_local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.query.local_addr()
    }

    /// Handle for feeding the worker queue from outside (console thread).
    pub fn command_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.msg_tx.clone()
    }

    /// Override the deferred-job delay before `run`. Tests shorten it to
    /// exercise the timer path without waiting out the real duration.
    pub fn set_job_duration(&mut self, delay: Duration) {
        self.router.set_job_duration(delay);
    }

    /// Runs the accept loops and the dispatch worker until the process
    /// exits or the task is aborted.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            cfg: _,
            router,
            clients,
            listener,
            query,
            msg_tx,
            mut msg_rx,
            started,
        } = self;

        tokio::spawn(accept_loop(listener, msg_tx.clone()));
        tokio::spawn(query.serve(msg_tx.clone()));

        let mut worker = Worker {
            router,
            clients,
            msg_tx,
            started,
        };
        while let Some(msg) = msg_rx.recv().await {
            worker.handle(msg);
        }
        Ok(())
    }
}

/// State owned by the dispatch worker. Only `handle` ever touches it.
struct Worker {
    router: EventRouter,
    clients: HashMap<PlayerId, mpsc::UnboundedSender<ServerEvent>>,
    msg_tx: mpsc::UnboundedSender<ServerMessage>,
    started: Instant,
}

impl Worker {
    fn handle(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Connected { id, tx } => {
                self.clients.insert(id, tx);
                let dispatch = self.router.handle_connect(id);
                self.deliver(id, dispatch);
            }
            ServerMessage::Inbound { id, event } => {
                let dispatch = self.router.handle_event(id, event, Instant::now());
                self.deliver(id, dispatch);
            }
            ServerMessage::Disconnected { id } => {
                self.clients.remove(&id);
                let dispatch = self.router.handle_disconnect(id);
                self.deliver(id, dispatch);
            }
            ServerMessage::JobElapsed { player, job } => {
                let dispatch = self.router.handle_job_elapsed(player, job);
                self.deliver(player, dispatch);
            }
            ServerMessage::Query(req) => {
                let body = match req.kind {
                    QueryKind::Players => serde_json::to_string(&self.router.store().players()),
                    QueryKind::Vehicles => serde_json::to_string(&self.router.store().vehicles()),
                };
                match body {
                    Ok(json) => {
                        let _ = req.reply.send(json);
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize query snapshot"),
                }
            }
            ServerMessage::Console(line) => {
                for out in self.exec_console(&line) {
                    println!("{out}");
                }
            }
        }
    }

    /// Fan a dispatch out to the connection channels and schedule its
    /// timers. Sends to closed channels are dropped; the reader task
    /// reports the disconnect separately.
    fn deliver(&mut self, sender: PlayerId, dispatch: Dispatch) {
        for OutboundEvent { audience, event } in dispatch.events {
            match audience {
                Audience::Sender => {
                    if let Some(tx) = self.clients.get(&sender) {
                        let _ = tx.send(event);
                    }
                }
                Audience::Others => {
                    for (id, tx) in &self.clients {
                        if *id != sender {
                            let _ = tx.send(event.clone());
                        }
                    }
                }
                Audience::All => {
                    for tx in self.clients.values() {
                        let _ = tx.send(event.clone());
                    }
                }
            }
        }
        for timer in dispatch.timers {
            let tx = self.msg_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timer.delay).await;
                let _ = tx.send(ServerMessage::JobElapsed {
                    player: timer.player,
                    job: timer.job,
                });
            });
        }
    }

    fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        match tokens[0] {
            "status" => vec![
                format!("Uptime: {}s", self.started.elapsed().as_secs()),
                format!("Connections: {}", self.clients.len()),
                format!("Players: {}", self.router.store().player_count()),
                format!("Vehicles: {}", self.router.store().vehicle_count()),
            ],
            "players" => {
                let players = self.router.store().players();
                let mut out = vec![format!("Players: {}", players.len())];
                for p in players {
                    out.push(format!(
                        "  {}: {} at ({:.1}, {:.1}) money={} vehicle={}",
                        p.id,
                        p.name,
                        p.pos.x,
                        p.pos.z,
                        p.money,
                        p.in_vehicle_id
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ));
                }
                out
            }
            "vehicles" => {
                let vehicles = self.router.store().vehicles();
                let mut out = vec![format!("Vehicles: {}", vehicles.len())];
                for v in vehicles {
                    out.push(format!(
                        "  {}: at ({:.1}, {:.1}) rot={:.2} owner={}",
                        v.id,
                        v.pos.x,
                        v.pos.z,
                        v.rot,
                        v.owner_id
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ));
                }
                out
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                std::process::exit(0);
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }
}

async fn accept_loop(listener: EventListener, tx: mpsc::UnboundedSender<ServerMessage>) {
    loop {
        match listener.accept().await {
            Ok((conn, peer)) => {
                let id = PlayerId::new_unique();
                info!(player = %id, %peer, "Client connected");
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                if tx.send(ServerMessage::Connected { id, tx: event_tx }).is_err() {
                    return;
                }
                let (reader, writer) = conn.into_split();
                tokio::spawn(write_loop(writer, event_rx));
                tokio::spawn(read_loop(id, reader, tx.clone()));
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

/// Forwards inbound frames to the worker until the connection dies; any
/// read error, including a malformed frame, becomes a disconnect.
async fn read_loop(id: PlayerId, mut reader: EventReader, tx: mpsc::UnboundedSender<ServerMessage>) {
    loop {
        match reader.recv::<ClientEvent>().await {
            Ok(event) => {
                if tx.send(ServerMessage::Inbound { id, event }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(player = %id, error = %e, "Client disconnected");
                let _ = tx.send(ServerMessage::Disconnected { id });
                return;
            }
        }
    }
}

/// Drains the connection's outbound channel onto the socket. Ends when the
/// worker drops the sender (disconnect) or the peer stops reading.
async fn write_loop(mut writer: EventWriter, mut rx: mpsc::UnboundedReceiver<ServerEvent>) {
    while let Some(event) = rx.recv().await {
        if writer.send(&event).await.is_err() {
            return;
        }
    }
}

/// Helper for tests: bind both listeners to ephemeral ports.
pub async fn bind_ephemeral() -> anyhow::Result<(GameServer, WorldConfig)> {
    let cfg = WorldConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        query_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let server = GameServer::bind(cfg).await?;
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
