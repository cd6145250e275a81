//! Event routing and broadcast planning.
//!
//! One inbound event in, an ordered fan-out plan out. The router owns the
//! entity store and all policy state (movement timestamps, pending jobs) and
//! runs synchronously: the caller feeds it events one at a time and then
//! delivers the returned dispatch, so store mutation is single-writer by
//! construction and broadcast order is deterministic. Nothing in this module
//! touches a socket.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::economy::{self, JobBoard, JOB_DURATION, JOB_REWARD, STARTING_BALANCE};
use crate::entity::{Player, PlayerId, VehicleId};
use crate::math::Vec2;
use crate::movement::MovementTracker;
use crate::net::{ClientEvent, ServerEvent};
use crate::store::EntityStore;
use crate::vehicle;

/// Half-extent of the square new players spawn in.
pub const SPAWN_RADIUS: f32 = 10.0;

/// Who receives an outbound event, relative to the triggering connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The triggering connection only.
    Sender,
    /// Every connection except the triggering one.
    Others,
    /// Every connection.
    All,
}

/// One planned delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// A deferred job completion the caller must schedule. When the delay
/// elapses, feed the ids back through `handle_job_elapsed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTimer {
    pub player: PlayerId,
    pub job: u64,
    pub delay: Duration,
}

/// Everything one inbound event produces, in delivery order.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub events: Vec<OutboundEvent>,
    pub timers: Vec<JobTimer>,
}

impl Dispatch {
    fn push(&mut self, audience: Audience, event: ServerEvent) {
        self.events.push(OutboundEvent { audience, event });
    }
}

/// The authoritative core: store plus every policy module, driven by events.
pub struct EventRouter {
    store: EntityStore,
    catalog: Catalog,
    movement: MovementTracker,
    jobs: JobBoard,
    job_duration: Duration,
}

impl EventRouter {
    pub fn new(catalog: Catalog) -> Self {
        let mut store = EntityStore::new();
        for v in vehicle::initial_vehicles() {
            info!(vehicle = %v.id, "Spawned vehicle");
            store.upsert_vehicle(v);
        }
        Self {
            store,
            catalog,
            movement: MovementTracker::new(),
            jobs: JobBoard::new(),
            job_duration: JOB_DURATION,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Override the deferred-job delay. Tests shorten it to drive the
    /// timer path without waiting out the real duration.
    pub fn set_job_duration(&mut self, delay: Duration) {
        self.job_duration = delay;
    }

    /// First contact: the connection learns its id.
    pub fn handle_connect(&mut self, id: PlayerId) -> Dispatch {
        debug!(player = %id, "Connection opened");
        let mut out = Dispatch::default();
        out.push(Audience::Sender, ServerEvent::Welcome { player_id: id });
        out
    }

    pub fn handle_event(&mut self, sender: PlayerId, event: ClientEvent, now: Instant) -> Dispatch {
        match event {
            ClientEvent::Join { name } => self.on_join(sender, name, now),
            ClientEvent::Move { x, z } => self.on_move(sender, Vec2::new(x, z), now),
            ClientEvent::OpenShop => self.on_open_shop(),
            ClientEvent::BuyItem { item_id } => self.on_buy(sender, &item_id),
            ClientEvent::StartJob { job_type } => self.on_start_job(sender, job_type),
            ClientEvent::EnterVehicle { vehicle_id } => self.on_enter(sender, &vehicle_id),
            ClientEvent::ExitVehicle { vehicle_id } => self.on_exit(sender, &vehicle_id),
            ClientEvent::VehicleMove { id, x, z, rot } => {
                self.on_drive(sender, &id, Vec2::new(x, z), rot)
            }
            ClientEvent::Interact => {
                let mut out = Dispatch::default();
                out.push(Audience::Sender, ServerEvent::InteractAck);
                out
            }
        }
    }

    /// Connection closed. Releases owned vehicles, then removes the player.
    pub fn handle_disconnect(&mut self, id: PlayerId) -> Dispatch {
        let mut out = Dispatch::default();
        self.movement.forget(id);
        self.jobs.forget(id);
        if self.store.player(id).is_none() {
            debug!(player = %id, "Connection closed before join");
            return out;
        }
        for v in vehicle::release_owned(&mut self.store, id) {
            out.push(Audience::All, ServerEvent::VehicleUpdate(v));
        }
        self.store.remove_player(id);
        info!(player = %id, "Player left");
        out.push(Audience::Others, ServerEvent::PlayerLeft { id });
        out
    }

    /// A job timer fired. Pays out only if the job is still pending, i.e.
    /// the player never disconnected in the meantime.
    pub fn handle_job_elapsed(&mut self, player: PlayerId, job: u64) -> Dispatch {
        let mut out = Dispatch::default();
        if !self.jobs.complete(player, job) {
            debug!(player = %player, job, "Job payout discarded");
            return out;
        }
        let Some(p) = economy::credit_job(&mut self.store, player) else {
            return out;
        };
        info!(player = %player, balance = p.money, "Job paid out");
        out.push(
            Audience::All,
            ServerEvent::PlayerUpdate {
                id: player,
                clothing: None,
                money: Some(p.money),
            },
        );
        out.push(
            Audience::Sender,
            ServerEvent::JobFinished { earned: JOB_REWARD },
        );
        out
    }

    fn on_join(&mut self, sender: PlayerId, name: String, now: Instant) -> Dispatch {
        let mut out = Dispatch::default();

        // A re-join while driving would orphan the ownership link, so any
        // owned vehicle is released before the record is replaced.
        for v in vehicle::release_owned(&mut self.store, sender) {
            out.push(Audience::All, ServerEvent::VehicleUpdate(v));
        }

        let name = if name.is_empty() {
            "Guest".to_string()
        } else {
            name
        };
        let mut rng = rand::thread_rng();
        let spawn = Vec2::new(
            rng.gen_range(-SPAWN_RADIUS..SPAWN_RADIUS),
            rng.gen_range(-SPAWN_RADIUS..SPAWN_RADIUS),
        );
        let player = Player::new(sender, name, spawn, STARTING_BALANCE);
        info!(player = %sender, name = %player.name, "Player joined");
        self.store.upsert_player(player.clone());
        self.movement.mark(sender, now);

        let snapshot: HashMap<PlayerId, Player> =
            self.store.players().into_iter().map(|p| (p.id, p)).collect();
        out.push(Audience::Sender, ServerEvent::CurrentPlayers(snapshot));
        out.push(
            Audience::Sender,
            ServerEvent::VehiclesSnapshot(self.store.vehicles()),
        );
        out.push(Audience::Others, ServerEvent::PlayerJoined(player));
        out
    }

    fn on_move(&mut self, sender: PlayerId, claimed: Vec2, now: Instant) -> Dispatch {
        let mut out = Dispatch::default();
        let Some(prev) = self.store.player(sender).map(|p| p.pos) else {
            return out;
        };
        let accepted = self.movement.accept(sender, prev, claimed, now);
        if let Some(p) = self.store.player_mut(sender) {
            p.pos = accepted;
        }
        out.push(
            Audience::Others,
            ServerEvent::PlayerMoved {
                id: sender,
                x: accepted.x,
                z: accepted.z,
            },
        );
        out
    }

    fn on_open_shop(&mut self) -> Dispatch {
        let mut out = Dispatch::default();
        out.push(
            Audience::Sender,
            ServerEvent::ShopOpened {
                items: self.catalog.items().to_vec(),
            },
        );
        out
    }

    fn on_buy(&mut self, sender: PlayerId, item_id: &str) -> Dispatch {
        let mut out = Dispatch::default();
        match economy::purchase(&mut self.store, &self.catalog, sender, item_id) {
            Ok(p) => {
                info!(player = %sender, item = %item_id, balance = p.money, "Item purchased");
                out.push(
                    Audience::All,
                    ServerEvent::PlayerUpdate {
                        id: sender,
                        clothing: Some(p.clothing),
                        money: Some(p.money),
                    },
                );
            }
            Err(e) => {
                if let Some(msg) = e.wire_message() {
                    out.push(Audience::Sender, ServerEvent::Error(msg.to_string()));
                }
            }
        }
        out
    }

    fn on_start_job(&mut self, sender: PlayerId, job_type: String) -> Dispatch {
        let mut out = Dispatch::default();
        if self.store.player(sender).is_none() {
            return out;
        }
        let job = self.jobs.begin(sender);
        debug!(player = %sender, job, job_type = %job_type, "Job started");
        out.push(Audience::Sender, ServerEvent::JobStarted { job_type });
        out.timers.push(JobTimer {
            player: sender,
            job,
            delay: self.job_duration,
        });
        out
    }

    fn on_enter(&mut self, sender: PlayerId, vehicle_id: &VehicleId) -> Dispatch {
        let mut out = Dispatch::default();
        match vehicle::enter(&mut self.store, sender, vehicle_id) {
            Ok(v) => {
                info!(player = %sender, vehicle = %v.id, "Vehicle entered");
                out.push(Audience::All, ServerEvent::VehicleUpdate(v));
                out.push(
                    Audience::All,
                    ServerEvent::EnteredVehicleAck {
                        vehicle_id: vehicle_id.clone(),
                        player_id: sender,
                    },
                );
            }
            Err(e) => {
                if let Some(msg) = e.wire_message() {
                    out.push(Audience::Sender, ServerEvent::Error(msg.to_string()));
                }
            }
        }
        out
    }

    fn on_exit(&mut self, sender: PlayerId, vehicle_id: &VehicleId) -> Dispatch {
        let mut out = Dispatch::default();
        match vehicle::exit(&mut self.store, sender, vehicle_id) {
            Ok((v, spot)) => {
                info!(player = %sender, vehicle = %v.id, "Vehicle exited");
                let vehicle_id = v.id.clone();
                out.push(Audience::All, ServerEvent::VehicleUpdate(v));
                out.push(
                    Audience::All,
                    ServerEvent::ExitedVehicleAck {
                        vehicle_id,
                        player_id: sender,
                        x: spot.x,
                        z: spot.z,
                    },
                );
            }
            Err(e) => {
                if let Some(msg) = e.wire_message() {
                    out.push(Audience::Sender, ServerEvent::Error(msg.to_string()));
                }
            }
        }
        out
    }

    fn on_drive(&mut self, sender: PlayerId, id: &VehicleId, pos: Vec2, rot: f32) -> Dispatch {
        let mut out = Dispatch::default();
        // Applied verbatim on success, so non-finite values must not get in.
        if !(pos.x.is_finite() && pos.z.is_finite() && rot.is_finite()) {
            return out;
        }
        // Failures here are always silent, including non-owner submissions.
        if let Ok(v) = vehicle::drive(&mut self.store, sender, id, pos, rot) {
            out.push(
                Audience::Others,
                ServerEvent::VehicleMoved {
                    id: v.id.clone(),
                    x: v.pos.x,
                    z: v.pos.z,
                    rot: v.rot,
                },
            );
            out.push(Audience::All, ServerEvent::VehicleUpdate(v));
        }
        out
    }
}
