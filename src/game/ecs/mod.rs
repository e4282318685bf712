//! Entity/component store

pub mod components;
pub mod entity;
pub mod store;

pub use components::{
    AmmoRack, AmmoRounds, BoxDims, Cooldown, DriveInput, Health, ProjectileState, TankStats,
    Transform, Velocity,
};
pub use entity::{Entity, EntityAllocator};
pub use store::ComponentStore;
