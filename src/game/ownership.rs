//! Two-way table between store entities and physics bodies

use hashbrown::HashMap;

use crate::game::ecs::Entity;
use crate::game::physics::ProjectileId;
use crate::game::SessionId;

/// Physics-side handle of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRef {
    Tank(SessionId),
    Projectile(ProjectileId),
}

#[derive(Debug, Default)]
pub struct OwnershipTable {
    by_entity: HashMap<Entity, BodyRef>,
    by_body: HashMap<BodyRef, Entity>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an entity to a body, replacing any previous binding of either side
    pub fn bind(&mut self, entity: Entity, body: BodyRef) {
        if let Some(old_body) = self.by_entity.insert(entity, body) {
            self.by_body.remove(&old_body);
        }
        if let Some(old_entity) = self.by_body.insert(body, entity) {
            if old_entity != entity {
                self.by_entity.remove(&old_entity);
            }
        }
    }

    pub fn unbind_entity(&mut self, entity: Entity) -> Option<BodyRef> {
        let body = self.by_entity.remove(&entity)?;
        self.by_body.remove(&body);
        Some(body)
    }

    pub fn unbind_body(&mut self, body: BodyRef) -> Option<Entity> {
        let entity = self.by_body.remove(&body)?;
        self.by_entity.remove(&entity);
        Some(entity)
    }

    #[inline]
    pub fn body(&self, entity: Entity) -> Option<BodyRef> {
        self.by_entity.get(&entity).copied()
    }

    #[inline]
    pub fn entity(&self, body: BodyRef) -> Option<Entity> {
        self.by_body.get(&body).copied()
    }

    #[inline]
    pub fn tank_entity(&self, session: SessionId) -> Option<Entity> {
        self.entity(BodyRef::Tank(session))
    }

    #[inline]
    pub fn projectile_entity(&self, id: ProjectileId) -> Option<Entity> {
        self.entity(BodyRef::Projectile(id))
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_bind_and_lookup() {
        let mut table = OwnershipTable::new();
        let session = Uuid::new_v4();
        let entity = Entity::from_raw(3);

        table.bind(entity, BodyRef::Tank(session));
        assert_eq!(table.tank_entity(session), Some(entity));
        assert_eq!(table.body(entity), Some(BodyRef::Tank(session)));
    }

    #[test]
    fn test_rebind_entity_drops_old_body() {
        let mut table = OwnershipTable::new();
        let entity = Entity::from_raw(0);
        let first = ProjectileId::new();
        let second = ProjectileId::new();

        table.bind(entity, BodyRef::Projectile(first));
        table.bind(entity, BodyRef::Projectile(second));

        assert_eq!(table.projectile_entity(first), None);
        assert_eq!(table.projectile_entity(second), Some(entity));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_rebind_body_drops_old_entity() {
        let mut table = OwnershipTable::new();
        let session = Uuid::new_v4();

        table.bind(Entity::from_raw(0), BodyRef::Tank(session));
        table.bind(Entity::from_raw(1), BodyRef::Tank(session));

        assert_eq!(table.body(Entity::from_raw(0)), None);
        assert_eq!(table.tank_entity(session), Some(Entity::from_raw(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unbind_twice() {
        let mut table = OwnershipTable::new();
        let id = ProjectileId::new();
        table.bind(Entity::from_raw(5), BodyRef::Projectile(id));

        assert_eq!(table.unbind_body(BodyRef::Projectile(id)), Some(Entity::from_raw(5)));
        assert_eq!(table.unbind_body(BodyRef::Projectile(id)), None);
        assert!(table.is_empty());
    }
}
