//! Authoritative entity store.
//!
//! Owns the player and vehicle maps behind a narrow get/upsert/remove API so
//! every mutation point is auditable. Holds no policy: validation lives in
//! the movement, vehicle, and economy modules. Snapshots list entities in
//! insertion order so listings and tests are deterministic.

use std::collections::HashMap;

use crate::entity::{Player, PlayerId, Vehicle, VehicleId};

#[derive(Debug, Default)]
pub struct EntityStore {
    players: HashMap<PlayerId, Player>,
    player_order: Vec<PlayerId>,
    vehicles: HashMap<VehicleId, Vehicle>,
    vehicle_order: Vec<VehicleId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Insert or replace a player record. A replacement keeps the original
    /// insertion position.
    pub fn upsert_player(&mut self, player: Player) {
        if !self.players.contains_key(&player.id) {
            self.player_order.push(player.id);
        }
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            self.player_order.retain(|p| *p != id);
        }
        removed
    }

    /// Point-in-time snapshot of all players, insertion-ordered.
    pub fn players(&self) -> Vec<Player> {
        self.player_order
            .iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicle_mut(&mut self, id: &VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id)
    }

    pub fn upsert_vehicle(&mut self, vehicle: Vehicle) {
        if !self.vehicles.contains_key(&vehicle.id) {
            self.vehicle_order.push(vehicle.id.clone());
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub fn remove_vehicle(&mut self, id: &VehicleId) -> Option<Vehicle> {
        let removed = self.vehicles.remove(id);
        if removed.is_some() {
            self.vehicle_order.retain(|v| v != id);
        }
        removed
    }

    /// Point-in-time snapshot of all vehicles, insertion-ordered.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicle_order
            .iter()
            .filter_map(|id| self.vehicles.get(id).cloned())
            .collect()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Ids of every vehicle owned by `owner`, insertion-ordered. Used when a
    /// departing player's vehicles must be released one by one.
    pub fn vehicles_owned_by(&self, owner: PlayerId) -> Vec<VehicleId> {
        self.vehicle_order
            .iter()
            .filter(|id| {
                self.vehicles
                    .get(*id)
                    .map(|v| v.owner_id == Some(owner))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn player(id: u32) -> Player {
        Player::new(PlayerId(id), format!("p{id}"), Vec2::ZERO, 100)
    }

    #[test]
    fn upsert_then_get_then_remove() {
        let mut store = EntityStore::new();
        store.upsert_player(player(1));
        assert_eq!(store.player(PlayerId(1)).unwrap().name, "p1");
        assert_eq!(store.player_count(), 1);

        let removed = store.remove_player(PlayerId(1)).unwrap();
        assert_eq!(removed.id, PlayerId(1));
        assert!(store.player(PlayerId(1)).is_none());
        assert_eq!(store.player_count(), 0);
    }

    #[test]
    fn snapshots_keep_insertion_order() {
        let mut store = EntityStore::new();
        for id in [3, 1, 2] {
            store.upsert_player(player(id));
        }
        store.remove_player(PlayerId(1));
        store.upsert_player(player(5));

        let ids: Vec<u32> = store.players().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![3, 2, 5]);
    }

    #[test]
    fn upsert_existing_player_keeps_position() {
        let mut store = EntityStore::new();
        store.upsert_player(player(1));
        store.upsert_player(player(2));

        let mut replacement = player(1);
        replacement.name = "renamed".to_string();
        store.upsert_player(replacement);

        let snapshot = store.players();
        let names: Vec<&str> = snapshot.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(store.player(PlayerId(1)).unwrap().name, "renamed");
        assert_eq!(names[0], "renamed");
    }

    #[test]
    fn vehicles_owned_by_filters_and_orders() {
        let mut store = EntityStore::new();
        let mut a = Vehicle::new(VehicleId::new("a"), Vec2::ZERO, 0.0);
        let b = Vehicle::new(VehicleId::new("b"), Vec2::ZERO, 0.0);
        let mut c = Vehicle::new(VehicleId::new("c"), Vec2::ZERO, 0.0);
        a.owner_id = Some(PlayerId(9));
        c.owner_id = Some(PlayerId(9));
        store.upsert_vehicle(a);
        store.upsert_vehicle(b);
        store.upsert_vehicle(c);

        let owned = store.vehicles_owned_by(PlayerId(9));
        assert_eq!(owned, vec![VehicleId::new("a"), VehicleId::new("c")]);
        assert!(store.vehicles_owned_by(PlayerId(1)).is_empty());
    }

    #[test]
    fn remove_vehicle_drops_from_snapshot() {
        let mut store = EntityStore::new();
        store.upsert_vehicle(Vehicle::new(VehicleId::new("a"), Vec2::ZERO, 0.0));
        store.upsert_vehicle(Vehicle::new(VehicleId::new("b"), Vec2::ZERO, 0.0));
        store.remove_vehicle(&VehicleId::new("a"));

        let ids: Vec<String> = store.vehicles().iter().map(|v| v.id.0.clone()).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }
}
