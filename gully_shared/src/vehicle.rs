//! Vehicle occupancy arbitration.
//!
//! Each vehicle is either free (no owner) or occupied by exactly one
//! player. Every ownership transition runs through this module so the
//! two-sided link never tears: after any call returns, a player's
//! `in_vehicle_id` is set iff that vehicle's `owner_id` is the player.
//! Transitions are all-or-nothing; a failed request mutates nothing.

use crate::entity::{PlayerId, Vehicle, VehicleId};
use crate::math::Vec2;
use crate::store::EntityStore;

/// How far behind the vehicle, along the inverse heading, a disembarking
/// player lands.
pub const EXIT_OFFSET: f32 = 1.8;

/// Arbiter failures. Which of these surface on the wire is decided per
/// operation by the event router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleError {
    UnknownPlayer,
    UnknownVehicle,
    Occupied,
    NotOwner,
    AlreadyDriving,
}

impl VehicleError {
    /// Message for `error` events; `None` means the failure is never
    /// reported, only dropped.
    pub fn wire_message(self) -> Option<&'static str> {
        match self {
            VehicleError::Occupied => Some("vehicle occupied"),
            VehicleError::NotOwner => Some("not owner"),
            VehicleError::AlreadyDriving => Some("already in a vehicle"),
            VehicleError::UnknownPlayer | VehicleError::UnknownVehicle => None,
        }
    }
}

/// The static world set spawned at server start.
pub fn initial_vehicles() -> Vec<Vehicle> {
    vec![Vehicle::new(VehicleId::new("rick1"), Vec2::new(8.0, 8.0), 0.0)]
}

/// `Free → Occupied`. Returns the updated vehicle snapshot for broadcast.
///
/// The occupancy check runs before the requester's own driving state, so
/// re-entering a vehicle you already occupy reads `Occupied`.
pub fn enter(
    store: &mut EntityStore,
    player: PlayerId,
    vehicle_id: &VehicleId,
) -> Result<Vehicle, VehicleError> {
    let driving = match store.player(player) {
        Some(p) => p.in_vehicle_id.is_some(),
        None => return Err(VehicleError::UnknownPlayer),
    };
    let vehicle = store
        .vehicle(vehicle_id)
        .ok_or(VehicleError::UnknownVehicle)?;
    if vehicle.owner_id.is_some() {
        return Err(VehicleError::Occupied);
    }
    if driving {
        return Err(VehicleError::AlreadyDriving);
    }

    let snapshot = {
        let vehicle = store
            .vehicle_mut(vehicle_id)
            .ok_or(VehicleError::UnknownVehicle)?;
        vehicle.owner_id = Some(player);
        vehicle.clone()
    };
    if let Some(p) = store.player_mut(player) {
        p.in_vehicle_id = Some(vehicle_id.clone());
    }
    Ok(snapshot)
}

/// `Occupied → Free`, owner only. Teleports the player to the exit spot
/// behind the vehicle and returns the freed vehicle snapshot plus that
/// position.
pub fn exit(
    store: &mut EntityStore,
    player: PlayerId,
    vehicle_id: &VehicleId,
) -> Result<(Vehicle, Vec2), VehicleError> {
    if store.player(player).is_none() {
        return Err(VehicleError::UnknownPlayer);
    }
    let vehicle = store
        .vehicle(vehicle_id)
        .ok_or(VehicleError::UnknownVehicle)?;
    if vehicle.owner_id != Some(player) {
        return Err(VehicleError::NotOwner);
    }
    let spot = exit_position(vehicle);

    let snapshot = {
        let vehicle = store
            .vehicle_mut(vehicle_id)
            .ok_or(VehicleError::UnknownVehicle)?;
        vehicle.owner_id = None;
        vehicle.clone()
    };
    if let Some(p) = store.player_mut(player) {
        p.in_vehicle_id = None;
        p.pos = spot;
    }
    Ok((snapshot, spot))
}

/// Owner-submitted position update. Applied verbatim; heading and position
/// are trusted from the driver, with no speed envelope.
pub fn drive(
    store: &mut EntityStore,
    player: PlayerId,
    vehicle_id: &VehicleId,
    pos: Vec2,
    rot: f32,
) -> Result<Vehicle, VehicleError> {
    let vehicle = store
        .vehicle_mut(vehicle_id)
        .ok_or(VehicleError::UnknownVehicle)?;
    if vehicle.owner_id != Some(player) {
        return Err(VehicleError::NotOwner);
    }
    vehicle.pos = pos;
    vehicle.rot = rot;
    Ok(vehicle.clone())
}

/// Free every vehicle owned by a departing player, in insertion order.
/// Returns the released snapshots, one broadcast each.
pub fn release_owned(store: &mut EntityStore, owner: PlayerId) -> Vec<Vehicle> {
    let owned = store.vehicles_owned_by(owner);
    let mut released = Vec::with_capacity(owned.len());
    for id in owned {
        if let Some(vehicle) = store.vehicle_mut(&id) {
            vehicle.owner_id = None;
            released.push(vehicle.clone());
        }
    }
    if let Some(p) = store.player_mut(owner) {
        p.in_vehicle_id = None;
    }
    released
}

fn exit_position(vehicle: &Vehicle) -> Vec2 {
    Vec2::new(
        vehicle.pos.x - vehicle.rot.sin() * EXIT_OFFSET,
        vehicle.pos.z - vehicle.rot.cos() * EXIT_OFFSET,
    )
}
