//! Drive input: hull speed and turn, turret traverse, gun laying

use std::f64::consts::{PI, TAU};

use crate::game::ecs::{DriveInput, TankStats, Transform};
use crate::game::physics::TankStateUpdate;
use crate::util::vec3::Vec3;

/// Wrap an angle into `(-PI, PI]`
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Move `current` toward `target` by at most `max_step`
#[inline]
fn approach(current: f64, target: f64, max_step: f64) -> f64 {
    current + (target - current).clamp(-max_step, max_step)
}

/// Sanitize a client-supplied drive input
pub fn clamp_input(input: DriveInput) -> DriveInput {
    let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
    DriveInput {
        throttle: finite_or_zero(input.throttle).clamp(-1.0, 1.0),
        turn: finite_or_zero(input.turn).clamp(-1.0, 1.0),
        turret_yaw_target: finite_or_zero(input.turret_yaw_target),
        gun_pitch_target: finite_or_zero(input.gun_pitch_target),
    }
}

/// Kinematic update for one tick of driving.
///
/// Vertical velocity is left to the physics world; only the horizontal
/// component follows the throttle.
pub fn drive(
    transform: &Transform,
    vertical_velocity: f64,
    stats: &TankStats,
    input: &DriveInput,
    dt: f64,
) -> TankStateUpdate {
    let input = clamp_input(*input);

    let hull_yaw = wrap_angle(transform.hull_yaw + input.turn * stats.hull_rotation_rate * dt);

    let speed = if input.throttle >= 0.0 {
        input.throttle * stats.max_speed
    } else {
        input.throttle * stats.max_reverse_speed
    };
    let horizontal = Vec3::forward_from_yaw(hull_yaw) * speed;

    let turret_step = stats.turret_rotation_rate * dt;
    let turret_yaw = match stats.turret_traverse_limit {
        Some(_) => {
            let target = stats.clamp_turret_yaw(input.turret_yaw_target);
            stats.clamp_turret_yaw(approach(transform.turret_yaw, target, turret_step))
        }
        None => {
            let delta = wrap_angle(input.turret_yaw_target - transform.turret_yaw);
            wrap_angle(transform.turret_yaw + delta.clamp(-turret_step, turret_step))
        }
    };

    let pitch_target = stats.clamp_gun_pitch(input.gun_pitch_target);
    let gun_pitch = stats.clamp_gun_pitch(approach(transform.gun_pitch, pitch_target, turret_step));

    TankStateUpdate {
        velocity: Some(Vec3::new(horizontal.x, vertical_velocity, horizontal.z)),
        hull_yaw: Some(hull_yaw),
        yaw_rate: Some(0.0),
        turret_yaw: Some(turret_yaw),
        gun_pitch: Some(gun_pitch),
        ..Default::default()
    }
}
