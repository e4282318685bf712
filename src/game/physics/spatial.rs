//! Broad-phase hash grid on the x/z plane
//!
//! Bodies are bucketed by the cell containing their centre. Pair queries only
//! look at a cell and its forward neighbours, so each pair is produced once.

use hashbrown::HashMap;

use crate::game::SessionId;
use crate::util::vec3::Vec3;

use super::body::ProjectileId;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 128;

/// Initial capacity for body vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, z) cell coordinates
pub type CellKey = (i32, i32);

/// Body identity stored in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialEntityId {
    Tank(SessionId),
    Projectile(ProjectileId),
}

/// Body data stored in the grid
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntity {
    pub id: SpatialEntityId,
    pub position: Vec3,
    /// Bounding radius on the x/z plane
    pub radius: f64,
}

/// Uniform hash grid rebuilt every step
pub struct SpatialGrid {
    inv_cell_size: f64,
    cells: HashMap<CellKey, Vec<SpatialEntity>>,
}

impl SpatialGrid {
    /// Cell size should exceed the largest body footprint
    pub fn new(cell_size: f64) -> Self {
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
        }
    }

    /// Empty every cell. Cells occupied since the last clear keep their
    /// allocation for the next step. Cells that stayed empty are dropped.
    pub fn clear(&mut self) {
        self.cells.retain(|_, cell| {
            let occupied = !cell.is_empty();
            cell.clear();
            occupied
        });
    }

    /// Number of cell keys currently held
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn position_to_cell(&self, position: Vec3) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.z * self.inv_cell_size).floor() as i32,
        )
    }

    #[inline]
    pub fn insert(&mut self, entity: SpatialEntity) {
        let key = self.position_to_cell(entity.position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(entity);
    }

    /// Bodies in the cell containing `position` and its eight neighbours
    pub fn query_neighbourhood(&self, position: Vec3) -> impl Iterator<Item = &SpatialEntity> {
        let (cx, cz) = self.position_to_cell(position);
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dz| {
                self.cells
                    .get(&(cx + dx, cz + dz))
                    .into_iter()
                    .flat_map(|cell| cell.iter())
            })
        })
    }

    /// Invoke `callback` once per candidate pair whose bounding circles overlap
    pub fn for_each_potential_collision<F>(&self, mut callback: F)
    where
        F: FnMut(&SpatialEntity, &SpatialEntity),
    {
        const FORWARD: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

        let mut check = |a: &SpatialEntity, b: &SpatialEntity| {
            let reach = a.radius + b.radius;
            let dx = a.position.x - b.position.x;
            let dz = a.position.z - b.position.z;
            if dx * dx + dz * dz <= reach * reach {
                callback(a, b);
            }
        };

        for (&(cx, cz), entities) in &self.cells {
            if entities.is_empty() {
                continue;
            }
            for i in 0..entities.len() {
                for j in (i + 1)..entities.len() {
                    check(&entities[i], &entities[j]);
                }
            }

            for (dx, dz) in FORWARD {
                if let Some(other_cell) = self.cells.get(&(cx + dx, cz + dz)) {
                    for entity in entities {
                        for other in other_cell {
                            check(entity, other);
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(|cell| cell.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_tank(x: f64, z: f64) -> SpatialEntity {
        SpatialEntity {
            id: SpatialEntityId::Tank(Uuid::new_v4()),
            position: Vec3::new(x, 1.0, z),
            radius: 3.5,
        }
    }

    fn create_test_projectile(x: f64, z: f64) -> SpatialEntity {
        SpatialEntity {
            id: SpatialEntityId::Projectile(ProjectileId::new()),
            position: Vec3::new(x, 1.0, z),
            radius: 0.25,
        }
    }

    #[test]
    fn test_pair_found_across_cell_boundary() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(create_test_tank(15.0, 0.0));
        grid.insert(create_test_projectile(17.0, 0.0));

        let mut pairs = 0;
        grid.for_each_potential_collision(|_, _| pairs += 1);
        assert_eq!(pairs, 1);
    }

    #[test]
    fn test_pair_reported_once() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(create_test_tank(1.0, 1.0));
        grid.insert(create_test_projectile(2.0, 1.0));
        grid.insert(create_test_projectile(2.3, 1.0));
        // Third projectile sits across the cell boundary from the second tank
        grid.insert(create_test_projectile(16.2, 1.0));
        grid.insert(create_test_tank(15.0, 1.0));

        let mut pairs: Vec<(SpatialEntityId, SpatialEntityId)> = Vec::new();
        grid.for_each_potential_collision(|a, b| pairs.push((a.id, b.id)));

        let unordered: hashbrown::HashSet<[SpatialEntityId; 2]> = pairs
            .iter()
            .map(|&(a, b)| {
                let mut key = [a, b];
                key.sort_by_key(|id| format!("{:?}", id));
                key
            })
            .collect();
        // Three pairs in the first cluster plus one across the boundary
        assert_eq!(pairs.len(), 4);
        assert_eq!(unordered.len(), pairs.len());
    }

    #[test]
    fn test_distant_bodies_not_paired() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(create_test_tank(0.0, 0.0));
        grid.insert(create_test_projectile(10.0, 0.0));

        let mut pairs = 0;
        grid.for_each_potential_collision(|_, _| pairs += 1);
        assert_eq!(pairs, 0);
    }

    #[test]
    fn test_clear_keeps_cells_empty() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(create_test_tank(0.0, 0.0));
        assert_eq!(grid.len(), 1);
        grid.clear();
        assert!(grid.is_empty());
        assert_eq!(grid.query_neighbourhood(Vec3::ZERO).count(), 0);
    }

    #[test]
    fn test_clear_drops_vacated_cells() {
        let mut grid = SpatialGrid::new(16.0);
        for round in 0..5 {
            grid.clear();
            for i in 0..300 {
                let x = (round * 300 + i) as f64 * 100.0;
                grid.insert(create_test_projectile(x, 0.0));
            }
        }
        // Only this round's cells and the previous round's vacated ones
        assert_eq!(grid.cell_count(), 600);

        grid.clear();
        assert!(grid.is_empty());
        assert_eq!(grid.cell_count(), 300);
        grid.clear();
        assert_eq!(grid.cell_count(), 0);
    }

    #[test]
    fn test_query_neighbourhood() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(create_test_tank(0.0, 0.0));
        grid.insert(create_test_tank(20.0, 0.0));
        grid.insert(create_test_tank(100.0, 0.0));
        assert_eq!(grid.query_neighbourhood(Vec3::new(1.0, 0.0, 1.0)).count(), 2);
    }
}
