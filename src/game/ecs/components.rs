//! Component types stored in the entity/component store
//!
//! Every component is a small value type; the store keeps one column per type.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::constants::{muzzle, tank};
use crate::game::physics::ProjectileId;
use crate::game::SessionId;
use crate::util::vec3::Vec3;

/// World transform of a tank or projectile
///
/// For tanks `position.y` is the hull box centre (the tank baseline).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub hull_yaw: f64,
    /// Turret yaw relative to the hull
    pub turret_yaw: f64,
    pub gun_pitch: f64,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Linear velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
}

/// Hit points, always kept within `[0, max]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f64,
    pub max: f64,
}

impl Health {
    pub fn new(max: f64) -> Self {
        Self { current: max, max }
    }

    /// Subtract damage, clamping at zero. Returns the damage actually absorbed.
    pub fn apply_damage(&mut self, amount: f64) -> f64 {
        let before = self.current;
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        before - self.current
    }

    /// Overwrite both values, restoring the `[0, max]` invariant
    pub fn set(&mut self, current: f64, max: f64) {
        self.max = max.max(0.0);
        self.current = current.clamp(0.0, self.max);
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.current <= 0.0
    }
}

/// Cannon reload timer in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    pub remaining: f64,
}

impl Cooldown {
    #[inline]
    pub fn decay(&mut self, dt: f64) {
        if self.remaining > 0.0 {
            self.remaining = (self.remaining - dt).max(0.0);
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }
}

/// One ammo type in a loadout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoRounds {
    pub name: String,
    pub count: u32,
}

impl AmmoRounds {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Ammunition carried by a tank
///
/// `remaining` always equals the sum of the loadout counts on the server.
/// Replicated copies only carry `remaining`, with an empty loadout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmmoRack {
    pub capacity: u32,
    pub remaining: u32,
    pub loadout: SmallVec<[AmmoRounds; 4]>,
}

impl AmmoRack {
    /// Build a rack from a loadout, merging duplicate ammo names
    pub fn from_loadout(entries: &[AmmoRounds]) -> Self {
        let mut loadout: SmallVec<[AmmoRounds; 4]> = SmallVec::new();
        for entry in entries {
            match loadout.iter_mut().find(|rounds| rounds.name == entry.name) {
                Some(existing) => existing.count = existing.count.saturating_add(entry.count),
                None => loadout.push(entry.clone()),
            }
        }
        let total = loadout
            .iter()
            .fold(0u32, |acc, rounds| acc.saturating_add(rounds.count));
        Self {
            capacity: total,
            remaining: total,
            loadout,
        }
    }

    /// Rounds left of one ammo type
    pub fn count_of(&self, name: &str) -> u32 {
        self.loadout
            .iter()
            .find(|rounds| rounds.name == name)
            .map(|rounds| rounds.count)
            .unwrap_or(0)
    }

    /// Deduct one round of `name`. Returns false if none are left.
    pub fn take_round(&mut self, name: &str) -> bool {
        match self.loadout.iter_mut().find(|rounds| rounds.name == name) {
            Some(rounds) if rounds.count > 0 => {
                rounds.count -= 1;
                self.remaining = self.remaining.saturating_sub(1);
                true
            }
            _ => false,
        }
    }
}

/// Box dimensions in metres (x = width, y = height, z = length)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDims {
    pub width: f64,
    pub height: f64,
    pub length: f64,
}

impl BoxDims {
    pub fn new(width: f64, height: f64, length: f64) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.width * 0.5, self.height * 0.5, self.length * 0.5)
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.width * self.height * self.length
    }
}

/// Static per-tank stats block
///
/// Angles are radians, rates radians per second, speeds metres per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TankStats {
    pub max_health: f64,
    pub max_speed: f64,
    pub max_reverse_speed: f64,
    pub turret_rotation_rate: f64,
    pub hull_rotation_rate: f64,
    pub gun_elevation: f64,
    pub gun_depression: f64,
    /// Horizontal traverse limit; `None` means the turret turns freely
    pub turret_traverse_limit: Option<f64>,
    pub barrel_length: f64,
    pub body: BoxDims,
    pub turret: BoxDims,
    /// Turret mount along the hull length, 0-100 (50 = centred)
    pub turret_x_percent: f64,
    /// Turret mount across the hull width, 0-100 (50 = centred)
    pub turret_y_percent: f64,
    pub armor: f64,
    pub rounds_per_minute: f64,
}

impl Default for TankStats {
    fn default() -> Self {
        Self {
            max_health: tank::MAX_HEALTH,
            max_speed: tank::MAX_SPEED,
            max_reverse_speed: tank::MAX_REVERSE_SPEED,
            turret_rotation_rate: tank::TURRET_ROTATION_RATE,
            hull_rotation_rate: tank::HULL_ROTATION_RATE,
            gun_elevation: tank::GUN_ELEVATION,
            gun_depression: tank::GUN_DEPRESSION,
            turret_traverse_limit: None,
            barrel_length: tank::BARREL_LENGTH,
            body: BoxDims::new(tank::BODY_WIDTH, tank::BODY_HEIGHT, tank::BODY_LENGTH),
            turret: BoxDims::new(tank::TURRET_WIDTH, tank::TURRET_HEIGHT, tank::TURRET_LENGTH),
            turret_x_percent: muzzle::DEFAULT_MOUNT_PERCENT,
            turret_y_percent: muzzle::DEFAULT_MOUNT_PERCENT,
            armor: tank::ARMOR,
            rounds_per_minute: tank::ROUNDS_PER_MINUTE,
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn percent(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

impl TankStats {
    /// Replace every malformed field with the value from `canonical`.
    ///
    /// Returns the cleaned stats and the names of the fields that were replaced.
    /// NaN must never reach the physics world, so this runs once whenever a
    /// tank is registered or its definition changes.
    pub fn sanitized(&self, canonical: &TankStats) -> (TankStats, Vec<&'static str>) {
        let mut clean = *self;
        let mut replaced = Vec::new();

        macro_rules! check {
            ($($field:ident).+, $valid:expr) => {
                if !$valid(clean.$($field).+) {
                    clean.$($field).+ = canonical.$($field).+;
                    replaced.push(stringify!($($field).+));
                }
            };
        }

        check!(max_health, positive);
        check!(max_speed, positive);
        check!(max_reverse_speed, non_negative);
        check!(turret_rotation_rate, positive);
        check!(hull_rotation_rate, positive);
        check!(gun_elevation, non_negative);
        check!(gun_depression, non_negative);
        check!(barrel_length, positive);
        check!(body.width, positive);
        check!(body.height, positive);
        check!(body.length, positive);
        check!(turret.width, positive);
        check!(turret.height, positive);
        check!(turret.length, positive);
        check!(turret_x_percent, percent);
        check!(turret_y_percent, percent);
        check!(armor, non_negative);
        check!(rounds_per_minute, positive);

        if let Some(limit) = clean.turret_traverse_limit {
            if !non_negative(limit) {
                clean.turret_traverse_limit = canonical.turret_traverse_limit;
                replaced.push("turret_traverse_limit");
            }
        }

        (clean, replaced)
    }

    #[inline]
    pub fn clamp_gun_pitch(&self, pitch: f64) -> f64 {
        if !pitch.is_finite() {
            return 0.0;
        }
        pitch.clamp(-self.gun_depression, self.gun_elevation)
    }

    #[inline]
    pub fn clamp_turret_yaw(&self, yaw: f64) -> f64 {
        if !yaw.is_finite() {
            return 0.0;
        }
        match self.turret_traverse_limit {
            Some(limit) => yaw.clamp(-limit, limit),
            None => yaw,
        }
    }
}

/// Kinematics of an in-flight shell beyond its transform/velocity
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileState {
    pub projectile_id: ProjectileId,
    pub shooter: SessionId,
    pub ammo: String,
    /// Seconds until the shell times out
    pub lifetime_remaining: f64,
}

impl Default for ProjectileState {
    fn default() -> Self {
        Self {
            projectile_id: ProjectileId::default(),
            shooter: SessionId::nil(),
            ammo: String::new(),
            lifetime_remaining: 0.0,
        }
    }
}

/// Last movement input received for a tank
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveInput {
    /// -1 (full reverse) to 1 (full forward)
    pub throttle: f64,
    /// -1 (turn right) to 1 (turn left)
    pub turn: f64,
    /// Desired turret yaw relative to the hull
    pub turret_yaw_target: f64,
    /// Desired gun pitch
    pub gun_pitch_target: f64,
}
