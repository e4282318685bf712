//! Per-tick game rules that operate on the component store

pub mod damage;
pub mod fire;
pub mod movement;
pub mod muzzle;
