pub mod constants;
pub mod controller;
pub mod ecs;
pub mod events;
pub mod input_buffer;
pub mod ownership;
pub mod physics;
pub mod systems;

pub use controller::{ControllerConfig, SimulationController};
pub use events::{ProjectileOutcome, SimEvent, TickReport};

/// Connected player identity
pub type SessionId = uuid::Uuid;
