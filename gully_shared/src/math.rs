//! Math types.
//!
//! The world is a flat ground plane, so everything here is 2D (x/z).
//! Stays small and deterministic; no SIMD, no unsafe.

use serde::{Deserialize, Serialize};

/// Ground-plane vector. Serializes with `x`/`z` keys so it can be
/// flattened into wire payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, z: 0.0 };

    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.z * rhs.z
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn len(self) -> f32 {
        self.len_sq().sqrt()
    }

    pub fn dist(self, rhs: Self) -> f32 {
        Self::new(rhs.x - self.x, rhs.z - self.z).len()
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(self.x + (to.x - self.x) * t, self.z + (to.z - self.z) * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_dist_345() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.dist(b), 5.0);
    }

    #[test]
    fn vec2_lerp_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, 6.0);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(1.0, 3.0));
    }
}
