//! Cannon state machine
//!
//! A tank is Ready when alive, its cooldown has elapsed and it still carries
//! the requested ammo. Firing deducts one round and starts the reload timer.

use std::fmt;

use crate::catalog::AmmoDefinition;
use crate::game::constants::reload_seconds;
use crate::game::ecs::{ComponentStore, Cooldown, Entity};

use super::muzzle::{compute_muzzle, Muzzle};

/// Why a fire request was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRejection {
    MissingTank,
    Destroyed,
    CoolingDown,
    OutOfAmmo,
    UnknownAmmo,
}

impl fmt::Display for FireRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FireRejection::MissingTank => "no such tank",
            FireRejection::Destroyed => "tank destroyed",
            FireRejection::CoolingDown => "reloading",
            FireRejection::OutOfAmmo => "out of ammo",
            FireRejection::UnknownAmmo => "unknown ammo",
        };
        f.write_str(reason)
    }
}

/// Check whether `entity` could fire `ammo_name` right now
pub fn check_ready(store: &ComponentStore, entity: Entity, ammo_name: &str) -> Result<(), FireRejection> {
    if store.transform(entity).is_none() || store.tank_stats(entity).is_none() {
        return Err(FireRejection::MissingTank);
    }
    if store.health(entity).map_or(true, |h| h.is_destroyed()) {
        return Err(FireRejection::Destroyed);
    }
    if !store.cooldown(entity).map_or(true, Cooldown::is_ready) {
        return Err(FireRejection::CoolingDown);
    }
    match store.ammo(entity) {
        Some(rack) if rack.remaining > 0 && rack.count_of(ammo_name) > 0 => Ok(()),
        _ => Err(FireRejection::OutOfAmmo),
    }
}

/// Fire one round: deduct ammo, start the reload and compute the muzzle
pub fn try_fire(
    store: &mut ComponentStore,
    entity: Entity,
    ammo: &AmmoDefinition,
) -> Result<Muzzle, FireRejection> {
    check_ready(store, entity, &ammo.name)?;

    let (transform, stats) = match (store.transform(entity), store.tank_stats(entity)) {
        (Some(transform), Some(stats)) => (*transform, *stats),
        _ => return Err(FireRejection::MissingTank),
    };

    let taken = store
        .ammo_mut(entity)
        .map_or(false, |rack| rack.take_round(&ammo.name));
    if !taken {
        return Err(FireRejection::OutOfAmmo);
    }
    store.set_cooldown(
        entity,
        Cooldown {
            remaining: reload_seconds(stats.rounds_per_minute),
        },
    );

    Ok(compute_muzzle(&transform, &stats, ammo.muzzle_velocity))
}
