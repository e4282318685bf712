//! Tank Arena Server Library
//!
//! Authoritative simulation core for a tank combat arena: an entity/component
//! store, a rigid body world with swept projectile collision, the controller
//! that turns contacts into damage, and a snapshot codec for replication.

pub mod catalog;
pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
