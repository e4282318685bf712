//! Shell damage against tank armour

use crate::catalog::AmmoDefinition;
use crate::game::constants::damage::NON_PENETRATION_FACTOR;
use crate::game::ecs::Health;

/// Result of one shell striking one tank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    /// Damage dealt by the shell (before clamping to remaining health)
    pub damage: f64,
    pub penetrated: bool,
    pub remaining_health: f64,
    /// True only on the hit that took health from positive to zero
    pub destroyed: bool,
}

/// Damage a shell deals against a given armour value.
///
/// Penetrating hits deal full damage, others half; the explosion value is
/// always added on top.
pub fn shell_damage(ammo: &AmmoDefinition, armor: f64) -> (f64, bool) {
    let penetrated = ammo.penetration > armor;
    let direct = if penetrated {
        ammo.damage
    } else {
        ammo.damage * NON_PENETRATION_FACTOR
    };
    let total = direct + ammo.explosion_damage;
    let total = if total.is_finite() { total.max(0.0) } else { 0.0 };
    (total, penetrated)
}

pub fn apply_hit(health: &mut Health, ammo: &AmmoDefinition, armor: f64) -> HitOutcome {
    let was_alive = !health.is_destroyed();
    let (damage, penetrated) = shell_damage(ammo, armor);
    health.apply_damage(damage);
    HitOutcome {
        damage,
        penetrated,
        remaining_health: health.current,
        destroyed: was_alive && health.is_destroyed(),
    }
}
