//! Rigid body world: ground, tank boxes, projectile spheres and contacts

pub mod body;
pub mod material;
pub mod spatial;
pub mod sweep;
pub mod terrain;
pub mod world;

pub use body::{
    BodyKind, ContactEvent, ContactKind, ProjectileId, ProjectileRemoval, ProjectileSnapshot,
    RemovalReason, SpawnProjectileOptions, StepResult, TankKinematics, TankSnapshot,
    TankStateUpdate,
};
pub use material::ContactMaterial;
pub use terrain::{Ground, Heightfield};
pub use world::{BodyId, PairKey, PhysicsWorld, WorldConfig};
