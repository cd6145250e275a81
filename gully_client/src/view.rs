//! Local world replica.
//!
//! Everything the client knows arrives as server events over the one
//! connection. `WorldView` folds those events into keyed copies of the
//! player and vehicle records plus a queue of printable notice lines
//! for the console loop. It never mutates the world on its own.

use std::collections::HashMap;

use gully_shared::entity::{Player, PlayerId, Vehicle, VehicleId};
use gully_shared::net::ServerEvent;

/// Client-side copy of the world, rebuilt purely from broadcasts.
#[derive(Default)]
pub struct WorldView {
    own_id: Option<PlayerId>,
    players: HashMap<PlayerId, Player>,
    vehicles: HashMap<VehicleId, Vehicle>,
    notices: Vec<String>,
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server event into the replica.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Welcome { player_id } => {
                self.own_id = Some(player_id);
            }
            ServerEvent::CurrentPlayers(players) => {
                self.notices.push(format!("{} player(s) online", players.len()));
                self.players = players;
            }
            ServerEvent::VehiclesSnapshot(vehicles) => {
                self.notices
                    .push(format!("{} vehicle(s) in the world", vehicles.len()));
                self.vehicles = vehicles.into_iter().map(|v| (v.id.clone(), v)).collect();
            }
            ServerEvent::PlayerJoined(player) => {
                self.notices.push(format!("{} joined", player.name));
                self.players.insert(player.id, player);
            }
            ServerEvent::PlayerMoved { id, x, z } => {
                if let Some(p) = self.players.get_mut(&id) {
                    p.pos.x = x;
                    p.pos.z = z;
                }
            }
            ServerEvent::PlayerLeft { id } => match self.players.remove(&id) {
                Some(p) => self.notices.push(format!("{} left", p.name)),
                None => self.notices.push(format!("Player {id} left")),
            },
            ServerEvent::PlayerUpdate {
                id,
                clothing,
                money,
            } => {
                let own = self.own_id == Some(id);
                if let Some(p) = self.players.get_mut(&id) {
                    if let Some(clothing) = clothing {
                        p.clothing = clothing;
                    }
                    if let Some(money) = money {
                        p.money = money;
                        if own {
                            self.notices.push(format!("Balance: ${money}"));
                        }
                    }
                }
            }
            ServerEvent::ShopOpened { items } => {
                self.notices.push("Shop catalog:".to_string());
                for item in items {
                    self.notices
                        .push(format!("  {} - {} (${})", item.id, item.label, item.price));
                }
            }
            ServerEvent::Error(message) => {
                self.notices.push(format!("Server error: {message}"));
            }
            ServerEvent::JobStarted { job_type } => {
                self.notices.push(format!("Job '{job_type}' started"));
            }
            ServerEvent::JobFinished { earned } => {
                self.notices.push(format!("Job finished, earned ${earned}"));
            }
            ServerEvent::VehicleUpdate(vehicle) => {
                self.vehicles.insert(vehicle.id.clone(), vehicle);
            }
            ServerEvent::EnteredVehicleAck {
                vehicle_id,
                player_id,
            } => {
                if let Some(p) = self.players.get_mut(&player_id) {
                    p.in_vehicle_id = Some(vehicle_id.clone());
                }
                if self.own_id == Some(player_id) {
                    self.notices.push(format!("Entered {vehicle_id}"));
                }
            }
            ServerEvent::ExitedVehicleAck {
                vehicle_id,
                player_id,
                x,
                z,
            } => {
                if let Some(p) = self.players.get_mut(&player_id) {
                    p.in_vehicle_id = None;
                    p.pos.x = x;
                    p.pos.z = z;
                }
                if self.own_id == Some(player_id) {
                    self.notices
                        .push(format!("Left {vehicle_id} at ({x:.1}, {z:.1})"));
                }
            }
            ServerEvent::VehicleMoved { id, x, z, rot } => {
                if let Some(v) = self.vehicles.get_mut(&id) {
                    v.pos.x = x;
                    v.pos.z = z;
                    v.rot = rot;
                }
            }
            ServerEvent::InteractAck => {
                self.notices.push("Interact acknowledged".to_string());
            }
        }
    }

    pub fn own_id(&self) -> Option<PlayerId> {
        self.own_id
    }

    pub fn own_player(&self) -> Option<&Player> {
        self.players.get(&self.own_id?)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Players sorted by id for stable console output.
    pub fn players(&self) -> Vec<&Player> {
        let mut list: Vec<&Player> = self.players.values().collect();
        list.sort_by_key(|p| p.id.0);
        list
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Vehicles sorted by id for stable console output.
    pub fn vehicles(&self) -> Vec<&Vehicle> {
        let mut list: Vec<&Vehicle> = self.vehicles.values().collect();
        list.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        list
    }

    /// Takes every pending notice line, oldest first.
    pub fn drain_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gully_shared::math::Vec2;

    fn player(id: u32, name: &str) -> Player {
        Player::new(PlayerId(id), name.to_string(), Vec2::ZERO, 100)
    }

    #[test]
    fn snapshot_then_join_builds_roster() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::Welcome {
            player_id: PlayerId(1),
        });

        let mut current = HashMap::new();
        current.insert(PlayerId(1), player(1, "Ada"));
        view.apply(ServerEvent::CurrentPlayers(current));
        view.apply(ServerEvent::PlayerJoined(player(2, "Brin")));

        let names: Vec<&str> = view.players().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Brin"]);
        assert_eq!(view.own_player().map(|p| p.name.as_str()), Some("Ada"));
    }

    #[test]
    fn moves_update_positions_silently() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::PlayerJoined(player(2, "Brin")));
        view.drain_notices();

        view.apply(ServerEvent::PlayerMoved {
            id: PlayerId(2),
            x: 3.0,
            z: -4.0,
        });
        assert_eq!(view.player(PlayerId(2)).map(|p| p.pos), Some(Vec2::new(3.0, -4.0)));
        assert!(view.drain_notices().is_empty());
    }

    #[test]
    fn leave_names_the_departed_player() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::PlayerJoined(player(2, "Brin")));
        view.drain_notices();

        view.apply(ServerEvent::PlayerLeft { id: PlayerId(2) });
        assert_eq!(view.drain_notices(), vec!["Brin left".to_string()]);
        assert!(view.player(PlayerId(2)).is_none());
    }

    #[test]
    fn own_balance_change_produces_a_notice() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::Welcome {
            player_id: PlayerId(1),
        });
        view.apply(ServerEvent::PlayerJoined(player(1, "Ada")));
        view.apply(ServerEvent::PlayerJoined(player(2, "Brin")));
        view.drain_notices();

        view.apply(ServerEvent::PlayerUpdate {
            id: PlayerId(2),
            clothing: None,
            money: Some(150),
        });
        assert!(view.drain_notices().is_empty());

        view.apply(ServerEvent::PlayerUpdate {
            id: PlayerId(1),
            clothing: None,
            money: Some(200),
        });
        assert_eq!(view.drain_notices(), vec!["Balance: $200".to_string()]);
        assert_eq!(view.own_player().map(|p| p.money), Some(200));
    }

    #[test]
    fn vehicle_lifecycle_tracks_seat_and_exit_spot() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::Welcome {
            player_id: PlayerId(1),
        });
        view.apply(ServerEvent::PlayerJoined(player(1, "Ada")));

        let rick = VehicleId::new("rick1");
        let mut v = Vehicle::new(rick.clone(), Vec2::new(8.0, 8.0), 0.0);
        v.owner_id = Some(PlayerId(1));
        view.apply(ServerEvent::VehicleUpdate(v));
        view.apply(ServerEvent::EnteredVehicleAck {
            vehicle_id: rick.clone(),
            player_id: PlayerId(1),
        });
        assert_eq!(
            view.own_player().and_then(|p| p.in_vehicle_id.clone()),
            Some(rick.clone())
        );

        view.apply(ServerEvent::VehicleMoved {
            id: rick.clone(),
            x: 20.0,
            z: 5.0,
            rot: 1.0,
        });
        assert_eq!(view.vehicle(&rick).map(|v| v.pos), Some(Vec2::new(20.0, 5.0)));

        view.apply(ServerEvent::ExitedVehicleAck {
            vehicle_id: rick.clone(),
            player_id: PlayerId(1),
            x: 20.0,
            z: 3.2,
        });
        let p = view.own_player().unwrap();
        assert_eq!(p.in_vehicle_id, None);
        assert_eq!(p.pos, Vec2::new(20.0, 3.2));
    }

    #[test]
    fn shop_and_errors_become_notices() {
        let mut view = WorldView::new();
        view.apply(ServerEvent::Error("insufficient".to_string()));
        let notices = view.drain_notices();
        assert_eq!(notices, vec!["Server error: insufficient".to_string()]);
    }
}
