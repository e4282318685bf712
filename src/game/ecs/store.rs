//! Struct-of-arrays component store
//!
//! One dense column per component type, indexed by entity. Each column keeps
//! a presence mask so that an entity can carry any subset of components.

use std::mem;

use bitvec::vec::BitVec;

use super::components::{
    AmmoRack, Cooldown, DriveInput, Health, ProjectileState, TankStats, Transform, Velocity,
};
use super::entity::{Entity, EntityAllocator};

/// A single component column
#[derive(Debug)]
pub struct Column<T> {
    values: Vec<T>,
    present: BitVec,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            present: BitVec::new(),
        }
    }
}

impl<T: Default> Column<T> {
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.present.get(index).map(|bit| *bit).unwrap_or(false)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if self.contains(index) {
            self.values.get(index)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if self.contains(index) {
            self.values.get_mut(index)
        } else {
            None
        }
    }

    pub fn insert(&mut self, index: usize, value: T) {
        if index >= self.values.len() {
            self.values.resize_with(index + 1, T::default);
            self.present.resize(index + 1, false);
        }
        self.values[index] = value;
        self.present.set(index, true);
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if !self.contains(index) {
            return None;
        }
        self.present.set(index, false);
        Some(mem::take(&mut self.values[index]))
    }

    /// Number of entities carrying this component
    pub fn count(&self) -> usize {
        self.present.count_ones()
    }
}

/// Generates `x`, `x_mut`, `set_x` and `remove_x` for each column
macro_rules! component_accessors {
    ($($column:ident: $ty:ty => $get:ident, $get_mut:ident, $set:ident, $remove:ident;)*) => {
        $(
            pub fn $get(&self, entity: Entity) -> Option<&$ty> {
                if !self.entities.is_alive(entity) {
                    return None;
                }
                self.$column.get(entity.index())
            }

            pub fn $get_mut(&mut self, entity: Entity) -> Option<&mut $ty> {
                if !self.entities.is_alive(entity) {
                    return None;
                }
                self.$column.get_mut(entity.index())
            }

            /// Attach or overwrite the component. Returns false for a dead entity.
            pub fn $set(&mut self, entity: Entity, value: $ty) -> bool {
                if !self.entities.is_alive(entity) {
                    return false;
                }
                self.$column.insert(entity.index(), value);
                true
            }

            pub fn $remove(&mut self, entity: Entity) -> Option<$ty> {
                if !self.entities.is_alive(entity) {
                    return None;
                }
                self.$column.remove(entity.index())
            }
        )*
    };
}

/// Entity/component store owned by the simulation controller
#[derive(Debug, Default)]
pub struct ComponentStore {
    entities: EntityAllocator,
    transforms: Column<Transform>,
    velocities: Column<Velocity>,
    healths: Column<Health>,
    ammo: Column<AmmoRack>,
    cooldowns: Column<Cooldown>,
    tank_stats: Column<TankStats>,
    projectiles: Column<ProjectileState>,
    drive: Column<DriveInput>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity with no components
    pub fn create_entity(&mut self) -> Entity {
        self.entities.create()
    }

    /// Invalidate an entity and clear every component it carried.
    ///
    /// Returns false when the entity was already gone.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let index = entity.index();
        self.transforms.remove(index);
        self.velocities.remove(index);
        self.healths.remove(index);
        self.ammo.remove(index);
        self.cooldowns.remove(index);
        self.tank_stats.remove(index);
        self.projectiles.remove(index);
        self.drive.remove(index);
        self.entities.destroy(entity)
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every live entity in index order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    /// Live entities with a transform and hit points
    pub fn tanks(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().filter(move |entity| {
            self.transforms.contains(entity.index()) && self.healths.contains(entity.index())
        })
    }

    /// Live entities with a transform and projectile state
    pub fn projectiles(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().filter(move |entity| {
            self.transforms.contains(entity.index()) && self.projectiles.contains(entity.index())
        })
    }

    pub fn tank_count(&self) -> usize {
        self.tanks().count()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles().count()
    }

    component_accessors! {
        transforms: Transform => transform, transform_mut, set_transform, remove_transform;
        velocities: Velocity => velocity, velocity_mut, set_velocity, remove_velocity;
        healths: Health => health, health_mut, set_health, remove_health;
        ammo: AmmoRack => ammo, ammo_mut, set_ammo, remove_ammo;
        cooldowns: Cooldown => cooldown, cooldown_mut, set_cooldown, remove_cooldown;
        tank_stats: TankStats => tank_stats, tank_stats_mut, set_tank_stats, remove_tank_stats;
        projectiles: ProjectileState => projectile, projectile_mut, set_projectile, remove_projectile;
        drive: DriveInput => drive, drive_mut, set_drive, remove_drive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec3::Vec3;

    fn create_test_tank(store: &mut ComponentStore) -> Entity {
        let entity = store.create_entity();
        store.set_transform(entity, Transform::at(Vec3::new(1.0, 0.8, 2.0)));
        store.set_tank_stats(entity, TankStats::default());
        store.set_health(entity, Health::new(500.0));
        entity
    }

    #[test]
    fn test_accessors_return_none_for_missing() {
        let store = ComponentStore::new();
        let ghost = Entity::from_raw(7);
        assert!(store.transform(ghost).is_none());
        assert!(store.health(ghost).is_none());
    }

    #[test]
    fn test_set_on_dead_entity_is_rejected() {
        let mut store = ComponentStore::new();
        let entity = store.create_entity();
        store.destroy_entity(entity);
        assert!(!store.set_health(entity, Health::new(10.0)));
    }

    #[test]
    fn test_destroy_clears_components() {
        let mut store = ComponentStore::new();
        let tank = create_test_tank(&mut store);

        assert!(store.destroy_entity(tank));
        assert!(!store.destroy_entity(tank));

        // Recycled slot must not inherit the old tank's components
        let fresh = store.create_entity();
        assert_eq!(fresh.index(), tank.index());
        assert!(store.transform(fresh).is_none());
        assert!(store.tank_stats(fresh).is_none());
        assert!(store.health(fresh).is_none());
    }

    #[test]
    fn test_stale_handle_cannot_destroy_successor() {
        let mut store = ComponentStore::new();
        let old = create_test_tank(&mut store);
        store.destroy_entity(old);
        let successor = create_test_tank(&mut store);
        assert_eq!(successor.index(), old.index());

        assert!(!store.destroy_entity(old));
        assert!(store.is_alive(successor));
        assert!(store.health(old).is_none());
        assert_eq!(store.health(successor).map(|h| h.current), Some(500.0));
    }

    #[test]
    fn test_tank_and_projectile_iteration() {
        let mut store = ComponentStore::new();
        let tank = create_test_tank(&mut store);

        let shell = store.create_entity();
        store.set_transform(shell, Transform::default());
        store.set_projectile(shell, ProjectileState::default());

        // Transform only: neither a tank nor a projectile
        let bare = store.create_entity();
        store.set_transform(bare, Transform::default());

        assert_eq!(store.tanks().collect::<Vec<_>>(), vec![tank]);
        assert_eq!(store.projectiles().collect::<Vec<_>>(), vec![shell]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_mut_accessor() {
        let mut store = ComponentStore::new();
        let tank = create_test_tank(&mut store);

        if let Some(health) = store.health_mut(tank) {
            health.apply_damage(200.0);
        }
        assert_eq!(store.health(tank).map(|h| h.current), Some(300.0));
    }

    #[test]
    fn test_remove_component() {
        let mut store = ComponentStore::new();
        let tank = create_test_tank(&mut store);

        assert!(store.remove_health(tank).is_some());
        assert!(store.remove_health(tank).is_none());
        assert!(store.is_alive(tank));
    }

    #[test]
    fn test_column_count() {
        let mut column: Column<Cooldown> = Column::default();
        column.insert(4, Cooldown { remaining: 1.0 });
        column.insert(1, Cooldown::default());
        assert_eq!(column.count(), 2);
        assert!(!column.contains(2));
        column.remove(4);
        assert_eq!(column.count(), 1);
    }
}
