//! Muzzle placement
//!
//! Clients run the same computation to predict where their shell appears, so
//! the arithmetic here must not be reordered or simplified.

use crate::game::constants::muzzle;
use crate::game::ecs::{TankStats, Transform};
use crate::util::vec3::Vec3;

/// Where and how a shell leaves the barrel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Muzzle {
    pub position: Vec3,
    /// Unit barrel direction
    pub direction: Vec3,
    pub velocity: Vec3,
}

/// Compute the muzzle for a tank at `transform` firing at `muzzle_speed` m/s.
///
/// `stats` must already have been through `TankStats::sanitized`.
pub fn compute_muzzle(transform: &Transform, stats: &TankStats, muzzle_speed: f64) -> Muzzle {
    let hull_yaw = transform.hull_yaw;
    let yaw = hull_yaw + transform.turret_yaw;
    let pitch = transform.gun_pitch;

    let body_length = stats.body.length;
    let body_width = stats.body.width;
    let turret_x_percent = stats.turret_x_percent;
    let turret_y_percent = stats.turret_y_percent;

    // Mount offset, rotated by hull yaw only
    let offset_forward = (0.5 - turret_x_percent / 100.0) * body_length;
    let offset_right = (turret_y_percent / 100.0 - 0.5) * body_width;
    let rx = offset_right * hull_yaw.cos() - offset_forward * hull_yaw.sin();
    let rz = offset_right * hull_yaw.sin() + offset_forward * hull_yaw.cos();

    let half_body_height = stats.body.height / 2.0;
    let half_turret_height = stats.turret.height / 2.0;

    let baseline_y = transform.position.y;
    let pivot = Vec3::new(
        transform.position.x,
        baseline_y + half_body_height + half_turret_height,
        transform.position.z,
    );

    let direction = Vec3::new(
        -yaw.sin() * pitch.cos(),
        pitch.sin(),
        -yaw.cos() * pitch.cos(),
    );

    let mut position = pivot + Vec3::new(rx, 0.0, rz) + direction * stats.barrel_length;

    let floor = baseline_y - half_body_height + muzzle::MUZZLE_TERRAIN_CLEARANCE;
    if position.y < floor {
        position.y = floor;
    }

    Muzzle {
        position,
        direction,
        velocity: direction * muzzle_speed,
    }
}
