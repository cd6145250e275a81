//! World entities: players and vehicles.
//!
//! These records are the authoritative truth held by the server and the
//! exact shapes broadcast on the wire, so field names follow the protocol
//! (`inVehicleId`, `ownerId`). Clients only ever hold copies rebuilt from
//! broadcasts.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::catalog::ClothingSlot;
use crate::math::Vec2;

static NEXT_PLAYER_ID: AtomicU32 = AtomicU32::new(1);

/// Connection-derived player identifier, stable for the connection lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Allocate a fresh process-unique id.
    pub fn new_unique() -> Self {
        PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle identifier, assigned at world initialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        VehicleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clothing-slot → color mapping. Colors are CSS-style hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub shirt: String,
    pub pants: String,
    pub hat: String,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            shirt: "#e05a44".to_string(),
            pants: "#131133".to_string(),
            hat: "#222222".to_string(),
        }
    }
}

impl Appearance {
    pub fn set(&mut self, slot: ClothingSlot, color: &str) {
        match slot {
            ClothingSlot::Shirt => self.shirt = color.to_string(),
            ClothingSlot::Pants => self.pants = color.to_string(),
            ClothingSlot::Hat => self.hat = color.to_string(),
        }
    }
}

/// Authoritative player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(flatten)]
    pub pos: Vec2,
    pub clothing: Appearance,
    pub money: u32,
    pub in_vehicle_id: Option<VehicleId>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, pos: Vec2, money: u32) -> Self {
        Self {
            id,
            name,
            pos,
            clothing: Appearance::default(),
            money,
            in_vehicle_id: None,
        }
    }
}

/// Authoritative vehicle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    #[serde(flatten)]
    pub pos: Vec2,
    pub rot: f32,
    pub owner_id: Option<PlayerId>,
}

impl Vehicle {
    pub fn new(id: VehicleId, pos: Vec2, rot: f32) -> Self {
        Self {
            id,
            pos,
            rot,
            owner_id: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_unique() {
        let a = PlayerId::new_unique();
        let b = PlayerId::new_unique();
        assert_ne!(a, b);
    }

    #[test]
    fn player_wire_shape_is_flat() {
        let p = Player::new(PlayerId(7), "Ada".to_string(), Vec2::new(1.5, -2.0), 100);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["id"], 7);
        assert_eq!(v["x"], 1.5);
        assert_eq!(v["z"], -2.0);
        assert_eq!(v["money"], 100);
        assert_eq!(v["inVehicleId"], serde_json::Value::Null);
        assert_eq!(v["clothing"]["shirt"], "#e05a44");
    }

    #[test]
    fn appearance_set_replaces_one_slot() {
        let mut a = Appearance::default();
        a.set(ClothingSlot::Pants, "#000000");
        assert_eq!(a.pants, "#000000");
        assert_eq!(a.shirt, "#e05a44");
    }

    #[test]
    fn vehicle_wire_shape_uses_owner_id() {
        let v = Vehicle::new(VehicleId::new("rick1"), Vec2::new(8.0, 8.0), 0.0);
        let j = serde_json::to_value(&v).unwrap();
        assert_eq!(j["id"], "rick1");
        assert_eq!(j["ownerId"], serde_json::Value::Null);
        assert_eq!(j["rot"], 0.0);
    }
}
