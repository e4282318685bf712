//! Snapshot codec
//!
//! Flattens the component store into parallel `f32` arrays for the wire and
//! hydrates a receiving store from them. Applying the same buffer twice
//! leaves the receiver unchanged the second time.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::ecs::{
    AmmoRack, ComponentStore, Cooldown, Entity, Health, ProjectileState, Transform, Velocity,
};
use crate::util::vec3::Vec3;

/// Parallel per-tank arrays; index `i` of every array describes one tank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankArrays {
    /// Sender entity ids (`Entity::to_bits`)
    pub ids: Vec<u64>,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub hull_yaw: Vec<f32>,
    pub turret_yaw: Vec<f32>,
    pub gun_pitch: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vz: Vec<f32>,
    pub health: Vec<f32>,
    pub max_health: Vec<f32>,
    pub cooldown: Vec<f32>,
    pub ammo_remaining: Vec<u32>,
}

/// Parallel per-projectile arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectileArrays {
    pub ids: Vec<u64>,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vz: Vec<f32>,
    /// Seconds left before timeout
    pub lifetime: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBuffer {
    pub tick: u64,
    pub tanks: TankArrays,
    pub projectiles: ProjectileArrays,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("{section} array '{field}' has {actual} entries, expected {expected}")]
    LengthMismatch {
        section: &'static str,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn check_len(
    section: &'static str,
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), SnapshotError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SnapshotError::LengthMismatch {
            section,
            field,
            expected,
            actual,
        })
    }
}

impl TankArrays {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let n = self.ids.len();
        let float_columns: [(&'static str, usize); 12] = [
            ("x", self.x.len()),
            ("y", self.y.len()),
            ("z", self.z.len()),
            ("hull_yaw", self.hull_yaw.len()),
            ("turret_yaw", self.turret_yaw.len()),
            ("gun_pitch", self.gun_pitch.len()),
            ("vx", self.vx.len()),
            ("vy", self.vy.len()),
            ("vz", self.vz.len()),
            ("health", self.health.len()),
            ("max_health", self.max_health.len()),
            ("cooldown", self.cooldown.len()),
        ];
        for (field, len) in float_columns {
            check_len("tanks", field, n, len)?;
        }
        check_len("tanks", "ammo_remaining", n, self.ammo_remaining.len())
    }
}

impl ProjectileArrays {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let n = self.ids.len();
        let columns: [(&'static str, usize); 7] = [
            ("x", self.x.len()),
            ("y", self.y.len()),
            ("z", self.z.len()),
            ("vx", self.vx.len()),
            ("vy", self.vy.len()),
            ("vz", self.vz.len()),
            ("lifetime", self.lifetime.len()),
        ];
        for (field, len) in columns {
            check_len("projectiles", field, n, len)?;
        }
        Ok(())
    }
}

impl SnapshotBuffer {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.tanks.validate()?;
        self.projectiles.validate()
    }
}

/// Flatten every tank and projectile in `store`
pub fn encode_snapshot(store: &ComponentStore, tick: u64) -> SnapshotBuffer {
    let mut tanks = TankArrays::default();
    for entity in store.tanks() {
        let Some(transform) = store.transform(entity) else {
            continue;
        };
        let velocity = store.velocity(entity).map(|v| v.linear).unwrap_or_default();
        let health = store.health(entity).copied().unwrap_or_default();

        tanks.ids.push(entity.to_bits());
        tanks.x.push(transform.position.x as f32);
        tanks.y.push(transform.position.y as f32);
        tanks.z.push(transform.position.z as f32);
        tanks.hull_yaw.push(transform.hull_yaw as f32);
        tanks.turret_yaw.push(transform.turret_yaw as f32);
        tanks.gun_pitch.push(transform.gun_pitch as f32);
        tanks.vx.push(velocity.x as f32);
        tanks.vy.push(velocity.y as f32);
        tanks.vz.push(velocity.z as f32);
        tanks.health.push(health.current as f32);
        tanks.max_health.push(health.max as f32);
        tanks
            .cooldown
            .push(store.cooldown(entity).map_or(0.0, |c| c.remaining) as f32);
        tanks
            .ammo_remaining
            .push(store.ammo(entity).map_or(0, |a| a.remaining));
    }

    let mut projectiles = ProjectileArrays::default();
    for entity in store.projectiles() {
        let (Some(transform), Some(state)) = (store.transform(entity), store.projectile(entity)) else {
            continue;
        };
        let velocity = store.velocity(entity).map(|v| v.linear).unwrap_or_default();

        projectiles.ids.push(entity.to_bits());
        projectiles.x.push(transform.position.x as f32);
        projectiles.y.push(transform.position.y as f32);
        projectiles.z.push(transform.position.z as f32);
        projectiles.vx.push(velocity.x as f32);
        projectiles.vy.push(velocity.y as f32);
        projectiles.vz.push(velocity.z as f32);
        projectiles.lifetime.push(state.lifetime_remaining as f32);
    }

    SnapshotBuffer {
        tick,
        tanks,
        projectiles,
    }
}

/// Hydrate `store` from `buffer`.
///
/// `map_id` turns a sender entity id into a local entity and must return the
/// same entity for the same id on every call. Every component carried by the
/// buffer is overwritten, so replays are harmless.
pub fn apply_snapshot<F>(
    store: &mut ComponentStore,
    buffer: &SnapshotBuffer,
    mut map_id: F,
) -> Result<(), SnapshotError>
where
    F: FnMut(&mut ComponentStore, u64) -> Entity,
{
    buffer.validate()?;

    let tanks = &buffer.tanks;
    for i in 0..tanks.len() {
        let entity = map_id(store, tanks.ids[i]);
        let transform = Transform {
            position: Vec3::new(tanks.x[i] as f64, tanks.y[i] as f64, tanks.z[i] as f64),
            hull_yaw: tanks.hull_yaw[i] as f64,
            turret_yaw: tanks.turret_yaw[i] as f64,
            gun_pitch: tanks.gun_pitch[i] as f64,
        };
        store.set_transform(entity, transform);
        store.set_velocity(
            entity,
            Velocity {
                linear: Vec3::new(tanks.vx[i] as f64, tanks.vy[i] as f64, tanks.vz[i] as f64),
            },
        );

        let mut health = Health::default();
        health.set(tanks.health[i] as f64, tanks.max_health[i] as f64);
        store.set_health(entity, health);
        store.set_cooldown(
            entity,
            Cooldown {
                remaining: tanks.cooldown[i] as f64,
            },
        );

        let remaining = tanks.ammo_remaining[i];
        match store.ammo_mut(entity) {
            Some(rack) => {
                rack.remaining = remaining;
                rack.capacity = rack.capacity.max(remaining);
            }
            None => {
                store.set_ammo(
                    entity,
                    AmmoRack {
                        capacity: remaining,
                        remaining,
                        ..Default::default()
                    },
                );
            }
        }
    }

    let projectiles = &buffer.projectiles;
    for i in 0..projectiles.len() {
        let entity = map_id(store, projectiles.ids[i]);
        let position = Vec3::new(
            projectiles.x[i] as f64,
            projectiles.y[i] as f64,
            projectiles.z[i] as f64,
        );
        let linear = Vec3::new(
            projectiles.vx[i] as f64,
            projectiles.vy[i] as f64,
            projectiles.vz[i] as f64,
        );
        match store.transform_mut(entity) {
            Some(transform) => transform.position = position,
            None => {
                store.set_transform(entity, Transform::at(position));
            }
        }
        store.set_velocity(entity, Velocity { linear });

        let lifetime_remaining = projectiles.lifetime[i] as f64;
        match store.projectile_mut(entity) {
            Some(state) => state.lifetime_remaining = lifetime_remaining,
            None => {
                store.set_projectile(
                    entity,
                    ProjectileState {
                        lifetime_remaining,
                        ..Default::default()
                    },
                );
            }
        }
    }

    Ok(())
}

/// Receiver-side id mapping from sender entity ids to local entities
#[derive(Debug, Default)]
pub struct EntityMap {
    remote_to_local: HashMap<u64, Entity>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local entity for `remote`, created on first sight (or if it was destroyed)
    pub fn resolve(&mut self, store: &mut ComponentStore, remote: u64) -> Entity {
        if let Some(&entity) = self.remote_to_local.get(&remote) {
            if store.is_alive(entity) {
                return entity;
            }
        }
        let entity = store.create_entity();
        self.remote_to_local.insert(remote, entity);
        entity
    }

    pub fn get(&self, remote: u64) -> Option<Entity> {
        self.remote_to_local.get(&remote).copied()
    }

    /// Apply `buffer` through this map, then destroy local entities the
    /// sender no longer reports
    pub fn apply(&mut self, store: &mut ComponentStore, buffer: &SnapshotBuffer) -> Result<(), SnapshotError> {
        apply_snapshot(store, buffer, |store, remote| self.resolve(store, remote))?;

        let mut stale: Vec<u64> = self
            .remote_to_local
            .keys()
            .copied()
            .filter(|remote| {
                !buffer.tanks.ids.contains(remote) && !buffer.projectiles.ids.contains(remote)
            })
            .collect();
        stale.sort_unstable();
        for remote in stale {
            if let Some(entity) = self.remote_to_local.remove(&remote) {
                store.destroy_entity(entity);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.remote_to_local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remote_to_local.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ecs::{AmmoRounds, TankStats};

    fn create_test_store() -> ComponentStore {
        let mut store = ComponentStore::new();

        let tank = store.create_entity();
        store.set_transform(
            tank,
            Transform {
                position: Vec3::new(12.5, 0.8, -40.25),
                hull_yaw: 0.75,
                turret_yaw: -0.2,
                gun_pitch: 0.05,
            },
        );
        store.set_velocity(
            tank,
            Velocity {
                linear: Vec3::new(1.0, 0.0, -3.0),
            },
        );
        store.set_health(tank, Health { current: 640.0, max: 1000.0 });
        store.set_cooldown(tank, Cooldown { remaining: 4.5 });
        store.set_ammo(tank, AmmoRack::from_loadout(&[AmmoRounds::new("AP", 7)]));
        store.set_tank_stats(tank, TankStats::default());

        let shell = store.create_entity();
        store.set_transform(shell, Transform::at(Vec3::new(3.0, 2.0, -10.0)));
        store.set_velocity(
            shell,
            Velocity {
                linear: Vec3::new(0.0, -1.0, -800.0),
            },
        );
        store.set_projectile(
            shell,
            ProjectileState {
                lifetime_remaining: 4.25,
                ..Default::default()
            },
        );

        store
    }

    fn tank_components(store: &ComponentStore, entity: Entity) -> (Transform, Velocity, Health, Cooldown, u32) {
        (
            *store.transform(entity).unwrap(),
            *store.velocity(entity).unwrap(),
            *store.health(entity).unwrap(),
            *store.cooldown(entity).unwrap(),
            store.ammo(entity).unwrap().remaining,
        )
    }

    #[test]
    fn test_encode_separates_tanks_and_projectiles() {
        let buffer = encode_snapshot(&create_test_store(), 42);
        assert_eq!(buffer.tick, 42);
        assert_eq!(buffer.tanks.ids, vec![0]);
        assert_eq!(buffer.projectiles.ids, vec![1]);
        assert_eq!(buffer.tanks.ammo_remaining, vec![7]);
        assert_eq!(buffer.tanks.health, vec![640.0]);
        assert_eq!(buffer.projectiles.lifetime, vec![4.25]);
        assert!(buffer.validate().is_ok());
    }

    #[test]
    fn test_apply_hydrates_receiver() {
        let buffer = encode_snapshot(&create_test_store(), 1);
        let mut receiver = ComponentStore::new();
        let mut map = EntityMap::new();
        map.apply(&mut receiver, &buffer).unwrap();

        let tank = map.get(0).unwrap();
        let (transform, velocity, health, cooldown, ammo) = tank_components(&receiver, tank);
        assert_eq!(transform.position, Vec3::new(12.5, 0.8f32 as f64, -40.25));
        assert_eq!(velocity.linear, Vec3::new(1.0, 0.0, -3.0));
        assert_eq!(health, Health { current: 640.0, max: 1000.0 });
        assert_eq!(cooldown.remaining, 4.5);
        assert_eq!(ammo, 7);

        let shell = map.get(1).unwrap();
        assert_eq!(receiver.projectile(shell).unwrap().lifetime_remaining, 4.25);
        assert_eq!(receiver.tanks().count(), 1);
        assert_eq!(receiver.projectiles().count(), 1);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let buffer = encode_snapshot(&create_test_store(), 7);
        let mut receiver = ComponentStore::new();
        let mut map = EntityMap::new();

        map.apply(&mut receiver, &buffer).unwrap();
        let tank = map.get(0).unwrap();
        let shell = map.get(1).unwrap();
        let first_tank = tank_components(&receiver, tank);
        let first_shell = (
            *receiver.transform(shell).unwrap(),
            *receiver.velocity(shell).unwrap(),
            receiver.projectile(shell).unwrap().clone(),
        );

        map.apply(&mut receiver, &buffer).unwrap();
        assert_eq!(map.get(0), Some(tank));
        assert_eq!(tank_components(&receiver, tank), first_tank);
        assert_eq!(
            (
                *receiver.transform(shell).unwrap(),
                *receiver.velocity(shell).unwrap(),
                receiver.projectile(shell).unwrap().clone(),
            ),
            first_shell
        );
        assert_eq!(receiver.len(), 2);

        // Re-encoding the receiver reproduces the buffer exactly
        assert_eq!(encode_snapshot(&receiver, 7), {
            let mut expected = buffer.clone();
            expected.tanks.ids = vec![tank.to_bits()];
            expected.projectiles.ids = vec![shell.to_bits()];
            expected
        });
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut buffer = encode_snapshot(&create_test_store(), 1);
        buffer.tanks.cooldown.clear();

        let mut receiver = ComponentStore::new();
        let result = apply_snapshot(&mut receiver, &buffer, |store, _| store.create_entity());
        assert_eq!(
            result,
            Err(SnapshotError::LengthMismatch {
                section: "tanks",
                field: "cooldown",
                expected: 1,
                actual: 0,
            })
        );
        // Nothing applied
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_vanished_entities_are_pruned() {
        let store = create_test_store();
        let buffer = encode_snapshot(&store, 1);
        let mut receiver = ComponentStore::new();
        let mut map = EntityMap::new();
        map.apply(&mut receiver, &buffer).unwrap();

        let mut later = buffer.clone();
        later.projectiles = ProjectileArrays::default();
        map.apply(&mut receiver, &later).unwrap();

        assert_eq!(receiver.projectiles().count(), 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_recycled_index_replicates_as_new_entity() {
        let mut server = ComponentStore::new();
        let tank = server.create_entity();
        server.set_transform(tank, Transform::at(Vec3::new(5.0, 0.8, 5.0)));
        server.set_health(tank, Health::new(800.0));

        let mut receiver = ComponentStore::new();
        let mut map = EntityMap::new();
        map.apply(&mut receiver, &encode_snapshot(&server, 1)).unwrap();
        let replicated_tank = map.get(tank.to_bits()).unwrap();

        // Same index, next generation
        server.destroy_entity(tank);
        let shell = server.create_entity();
        assert_eq!(shell.index(), tank.index());
        server.set_transform(shell, Transform::at(Vec3::new(0.0, 3.0, 0.0)));
        server.set_projectile(
            shell,
            ProjectileState {
                lifetime_remaining: 2.0,
                ..Default::default()
            },
        );

        let buffer = encode_snapshot(&server, 4);
        assert_ne!(buffer.projectiles.ids[0], tank.to_bits());
        map.apply(&mut receiver, &buffer).unwrap();

        assert_eq!(receiver.tanks().count(), 0);
        assert_eq!(receiver.projectiles().count(), 1);
        assert!(!receiver.is_alive(replicated_tank));
        let replicated_shell = map.get(shell.to_bits()).unwrap();
        assert!(receiver.health(replicated_shell).is_none());
        assert_eq!(map.get(tank.to_bits()), None);
    }

    #[test]
    fn test_empty_snapshot() {
        let buffer = encode_snapshot(&ComponentStore::new(), 0);
        assert!(buffer.tanks.is_empty());
        assert!(buffer.projectiles.is_empty());
    }
}
