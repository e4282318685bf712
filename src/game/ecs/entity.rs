//! Entity handles and the free-list allocator behind them
//!
//! An entity is a dense index plus a generation. Destroyed indices go on a
//! free list and are handed out again by the next `create` with a bumped
//! generation, so every component column stays as long as the peak entity
//! count while handles to a destroyed entity never alias its successor.

use std::fmt;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

/// Opaque handle for one tank or projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Entity { index, generation }
    }

    /// First-generation handle for `index`
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Entity::new(index, 0)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Stable wire id: generation in the high half, index in the low half
    #[inline]
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Entity::new(bits as u32, (bits >> 32) as u32)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.index, self.generation)
    }
}

/// Allocates entity indices and tracks which ones are alive
#[derive(Debug, Default)]
pub struct EntityAllocator {
    alive: BitVec,
    generations: Vec<u32>,
    free: Vec<u32>,
    live_count: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free index (recycled first, otherwise a fresh one)
    pub fn create(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.alive.len() as u32;
                self.alive.push(false);
                self.generations.push(0);
                index
            }
        };
        self.alive.set(index as usize, true);
        self.live_count += 1;
        Entity::new(index, self.generations[index as usize])
    }

    /// Release an entity. Returns false if it was not alive (idempotent),
    /// including for a stale handle whose index has been reused.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index();
        self.alive.set(index, false);
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(entity.index);
        self.live_count -= 1;
        true
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index();
        self.alive.get(index).map(|bit| *bit).unwrap_or(false)
            && self.generations.get(index) == Some(&entity.generation)
    }

    /// Number of live entities
    #[inline]
    pub fn len(&self) -> usize {
        self.live_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Highest index ever handed out + 1 (column length needed)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.alive.len()
    }

    /// Iterate live entities in index order
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter_ones()
            .map(|index| Entity::new(index as u32, self.generations[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sequential() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let b = allocator.create();
        assert_eq!(a, Entity::new(0, 0));
        assert_eq!(b, Entity::new(1, 0));
        assert_eq!(allocator.len(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        assert!(allocator.destroy(a));
        assert!(!allocator.destroy(a));
        assert_eq!(allocator.len(), 0);
    }

    #[test]
    fn test_destroy_unknown_entity() {
        let mut allocator = EntityAllocator::new();
        assert!(!allocator.destroy(Entity::from_raw(42)));
        assert!(!allocator.is_alive(Entity::from_raw(42)));
    }

    #[test]
    fn test_free_list_recycles_indices() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let _b = allocator.create();
        allocator.destroy(a);

        let c = allocator.create();
        assert_eq!(c.index(), a.index());
        assert_eq!(c.generation(), a.generation() + 1);
        assert_ne!(c, a);
        assert_eq!(allocator.capacity(), 2);
    }

    #[test]
    fn test_stale_handle_after_recycle() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        allocator.destroy(a);
        let b = allocator.create();

        assert!(!allocator.is_alive(a));
        assert!(!allocator.destroy(a));
        assert!(allocator.is_alive(b));
        assert_eq!(allocator.len(), 1);
    }

    #[test]
    fn test_bits_round_trip_keeps_generation() {
        let entity = Entity::new(7, 3);
        assert_eq!(entity.to_bits(), (3u64 << 32) | 7);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
    }

    #[test]
    fn test_iter_skips_dead() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let b = allocator.create();
        let c = allocator.create();
        allocator.destroy(b);

        let live: Vec<Entity> = allocator.iter().collect();
        assert_eq!(live, vec![a, c]);
    }
}
