//! Movement validation.
//!
//! Soft anti-teleport clamp: the claimed direction is trusted, only the
//! displacement magnitude is bounded by a maximum-speed envelope. This is
//! not a physics simulation and does no collision or pathing.

use std::collections::HashMap;
use std::time::Instant;

use crate::entity::PlayerId;
use crate::math::Vec2;

/// Maximum legitimate player speed, world units per second.
pub const MAX_SPEED: f32 = 12.0;

/// Claimed speeds up to this multiple of `MAX_SPEED` pass unmodified.
pub const SPEED_TOLERANCE: f32 = 1.6;

/// Elapsed-time floor in seconds, so implied speed never divides by zero.
pub const MIN_ELAPSED_SECS: f32 = 0.001;

/// Clamp a claimed position against the speed envelope.
///
/// If the implied speed stays at or under `MAX_SPEED * SPEED_TOLERANCE` the
/// claim is accepted verbatim. Otherwise the displacement is scaled down to
/// exactly the envelope distance for `elapsed_secs`, along the same
/// direction. Claims with a non-finite displacement are refused and `prev`
/// is returned unchanged.
pub fn clamp_to_envelope(prev: Vec2, claimed: Vec2, elapsed_secs: f32) -> Vec2 {
    let elapsed = elapsed_secs.max(MIN_ELAPSED_SECS);
    let dist = prev.dist(claimed);
    // NaN or infinite claims, and finite claims whose displacement
    // overflows, all land here; none of them moves the player.
    if !dist.is_finite() {
        return prev;
    }
    let speed = dist / elapsed;
    let ceiling = MAX_SPEED * SPEED_TOLERANCE;
    if speed <= ceiling {
        return claimed;
    }
    // Unreachable at zero distance (speed would be zero), but keep the
    // divisor guarded.
    let divisor = if dist > 0.0 { dist } else { 1.0 };
    let ratio = (ceiling * elapsed) / divisor;
    prev.lerp(claimed, ratio)
}

/// Per-player last-accepted-update instants plus the clamp above.
///
/// Timestamps live here rather than on the player record so the records
/// stay wire-serializable.
#[derive(Debug, Default)]
pub struct MovementTracker {
    last_update: HashMap<PlayerId, Instant>,
}

impl MovementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `now` without validating anything. Called at join so the first
    /// move is measured from spawn time.
    pub fn mark(&mut self, id: PlayerId, now: Instant) {
        self.last_update.insert(id, now);
    }

    /// Validate a claimed position and advance the player's timestamp.
    /// Returns the accepted position; the caller writes it to the store.
    pub fn accept(&mut self, id: PlayerId, prev: Vec2, claimed: Vec2, now: Instant) -> Vec2 {
        let elapsed = self
            .last_update
            .get(&id)
            .map(|last| now.saturating_duration_since(*last).as_secs_f32())
            .unwrap_or(MIN_ELAPSED_SECS);
        self.last_update.insert(id, now);
        clamp_to_envelope(prev, claimed, elapsed)
    }

    pub fn forget(&mut self, id: PlayerId) {
        self.last_update.remove(&id);
    }

    #[cfg(test)]
    fn tracked(&self, id: PlayerId) -> bool {
        self.last_update.contains_key(&id)
    }
}
