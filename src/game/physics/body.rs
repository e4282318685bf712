//! Body types and the records the world hands back to the controller

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::ecs::BoxDims;
use crate::game::SessionId;
use crate::util::vec3::Vec3;

/// Identity of an in-flight projectile body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ProjectileId(pub Uuid);

impl ProjectileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProjectileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind tag carried by every collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Ground,
    Tank,
    Projectile,
}

impl BodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Ground => "ground",
            BodyKind::Tank => "tank",
            BodyKind::Projectile => "projectile",
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collision shape of a dynamic body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec3 },
    Sphere { radius: f64 },
}

/// Point-mass rigid body with yaw-only rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f64,
    pub yaw_rate: f64,
    pub mass: f64,
    pub inv_mass: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub shape: Shape,
}

impl RigidBody {
    pub fn new(shape: Shape, mass: f64, linear_damping: f64, angular_damping: f64) -> Self {
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            yaw_rate: 0.0,
            mass,
            inv_mass,
            linear_damping,
            angular_damping,
            shape,
        }
    }

    /// Semi-implicit Euler step with gravity and exponential damping
    pub fn integrate(&mut self, gravity: f64, dt: f64) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.velocity.y += gravity * dt;
        self.velocity *= (1.0 - self.linear_damping).powf(dt);
        self.yaw_rate *= (1.0 - self.angular_damping).powf(dt);
        self.position += self.velocity * dt;
        self.yaw += self.yaw_rate * dt;
    }
}

/// Kinematic state of a tank as seen by the world
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TankKinematics {
    /// Hull box centre
    pub position: Vec3,
    pub velocity: Vec3,
    pub hull_yaw: f64,
    pub turret_yaw: f64,
    pub gun_pitch: f64,
}

/// Partial update merged onto a registered tank
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TankStateUpdate {
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
    pub hull_yaw: Option<f64>,
    pub yaw_rate: Option<f64>,
    pub turret_yaw: Option<f64>,
    pub gun_pitch: Option<f64>,
}

/// Dynamic box body plus the geometry needed for hit tests
#[derive(Debug, Clone)]
pub struct TankBody {
    pub session: SessionId,
    pub body: RigidBody,
    pub hull: BoxDims,
    pub turret: BoxDims,
    pub turret_yaw: f64,
    pub gun_pitch: f64,
}

impl TankBody {
    pub fn kinematics(&self) -> TankKinematics {
        TankKinematics {
            position: self.body.position,
            velocity: self.body.velocity,
            hull_yaw: self.body.yaw,
            turret_yaw: self.turret_yaw,
            gun_pitch: self.gun_pitch,
        }
    }

    /// Half height of the hull box
    #[inline]
    pub fn half_height(&self) -> f64 {
        self.hull.height * 0.5
    }

    /// Oriented hit box covering hull and turret: (centre, half extents, yaw)
    pub fn hit_box(&self) -> (Vec3, Vec3, f64) {
        let half = Vec3::new(
            self.hull.width * 0.5,
            (self.hull.height + self.turret.height) * 0.5,
            self.hull.length * 0.5,
        );
        let centre = self.body.position + Vec3::new(0.0, self.turret.height * 0.5, 0.0);
        (centre, half, self.body.yaw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub session: SessionId,
    pub state: TankKinematics,
}

/// Options for [`super::PhysicsWorld::spawn_projectile`]
#[derive(Debug, Clone, Default)]
pub struct SpawnProjectileOptions {
    /// Caller-provided id; generated when absent
    pub id: Option<ProjectileId>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub shooter: SessionId,
    pub ammo: String,
    pub radius: Option<f64>,
    pub mass: Option<f64>,
    pub lifetime_ms: Option<f64>,
    /// Simulation clock at spawn time (ms)
    pub now_ms: f64,
}

/// Dynamic sphere body plus projectile metadata
#[derive(Debug, Clone)]
pub struct ProjectileBody {
    pub id: ProjectileId,
    pub body: RigidBody,
    pub radius: f64,
    pub shooter: SessionId,
    pub ammo: String,
    pub spawned_at_ms: f64,
    pub lifetime_ms: f64,
    /// Position at the start of the current step, for swept tests
    pub previous_position: Vec3,
}

impl ProjectileBody {
    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id,
            position: self.body.position,
            velocity: self.body.velocity,
            shooter: self.shooter,
            ammo: self.ammo.clone(),
            radius: self.radius,
            spawned_at_ms: self.spawned_at_ms,
            lifetime_ms: self.lifetime_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: ProjectileId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub shooter: SessionId,
    pub ammo: String,
    pub radius: f64,
    pub spawned_at_ms: f64,
    pub lifetime_ms: f64,
}

/// Why a projectile body left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalReason {
    Manual,
    Expired,
    OutOfBounds,
    Collision,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::Manual => "manual",
            RemovalReason::Expired => "expired",
            RemovalReason::OutOfBounds => "out-of-bounds",
            RemovalReason::Collision => "collision",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileRemoval {
    pub id: ProjectileId,
    pub reason: RemovalReason,
    pub snapshot: ProjectileSnapshot,
}

/// What a projectile touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactKind {
    Tank { target: SessionId },
    Terrain,
}

/// Projectile contact reported by a world step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub kind: ContactKind,
    pub projectile: ProjectileId,
    pub shooter: SessionId,
    pub ammo: String,
    pub point: Vec3,
    /// Closing speed along the contact (m/s)
    pub relative_speed: f64,
    /// Found by the swept test rather than overlap at the end of the step
    pub swept: bool,
}

impl ContactEvent {
    #[inline]
    pub fn is_tank(&self) -> bool {
        matches!(self.kind, ContactKind::Tank { .. })
    }
}

/// Everything one world step produced
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub contacts: Vec<ContactEvent>,
    pub removals: Vec<ProjectileRemoval>,
    pub tanks: Vec<TankSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_applies_gravity() {
        let mut body = RigidBody::new(Shape::Sphere { radius: 0.25 }, 2.0, 0.0, 0.0);
        body.integrate(-10.0, 0.1);
        assert!((body.velocity.y + 1.0).abs() < 1e-12);
        // Semi-implicit: position uses the updated velocity
        assert!((body.position.y + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_damping() {
        let mut body = RigidBody::new(Shape::Sphere { radius: 0.25 }, 2.0, 0.5, 0.0);
        body.velocity = Vec3::new(10.0, 0.0, 0.0);
        body.integrate(0.0, 1.0);
        assert!((body.velocity.x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_body_does_not_move() {
        let mut body = RigidBody::new(Shape::Sphere { radius: 1.0 }, 0.0, 0.0, 0.0);
        body.integrate(-9.82, 1.0);
        assert_eq!(body.position, Vec3::ZERO);
    }

    #[test]
    fn test_removal_reason_strings() {
        assert_eq!(RemovalReason::OutOfBounds.as_str(), "out-of-bounds");
        assert_eq!(
            serde_json::to_string(&RemovalReason::OutOfBounds).unwrap(),
            "\"out-of-bounds\""
        );
    }
}
