//! `gully_shared`
//!
//! Shared sandbox libraries used by both client and server.
//!
//! Design goals:
//! - The synchronization core (store, movement, vehicle, economy, router)
//!   is pure and synchronous; sockets never reach past `net`.
//! - Deterministic where practical: insertion-ordered snapshots, ordered
//!   broadcast plans.
//! - No `unsafe`.

pub mod catalog;
pub mod config;
pub mod economy;
pub mod entity;
pub mod math;
pub mod movement;
pub mod net;
pub mod router;
pub mod store;
pub mod vehicle;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::catalog::*;
    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::router::*;
    pub use crate::store::*;
}
