//! Static ground collider: flat plane or sampled heightfield

use tracing::warn;

use crate::catalog::TerrainDefinition;
use crate::util::vec3::Vec3;

/// Square elevation grid centred on the origin
///
/// `heights` is row-major with rows along z and columns along x.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    size: f64,
    resolution: usize,
    cell: f64,
    heights: Vec<f64>,
}

impl Heightfield {
    /// Build a heightfield. `None` when the grid is malformed.
    pub fn new(size: f64, resolution: usize, heights: Vec<f64>) -> Option<Self> {
        if !(size.is_finite() && size > 0.0) || resolution < 2 {
            return None;
        }
        if heights.len() != resolution * resolution || heights.iter().any(|h| !h.is_finite()) {
            return None;
        }
        Some(Self {
            size,
            resolution,
            cell: size / (resolution - 1) as f64,
            heights,
        })
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.size
    }

    #[inline]
    fn sample(&self, col: usize, row: usize) -> f64 {
        self.heights[row * self.resolution + col]
    }

    /// Grid coordinate along one axis, clamped to the grid
    #[inline]
    fn grid_coord(&self, world: f64) -> (usize, usize, f64) {
        let max = (self.resolution - 1) as f64;
        let g = ((world + self.size * 0.5) / self.cell).clamp(0.0, max);
        let i0 = g.floor() as usize;
        let i1 = (i0 + 1).min(self.resolution - 1);
        (i0, i1, g - i0 as f64)
    }

    /// Bilinear height at a world x/z
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        let (c0, c1, tx) = self.grid_coord(x);
        let (r0, r1, tz) = self.grid_coord(z);
        let top = self.sample(c0, r0) * (1.0 - tx) + self.sample(c1, r0) * tx;
        let bottom = self.sample(c0, r1) * (1.0 - tx) + self.sample(c1, r1) * tx;
        top * (1.0 - tz) + bottom * tz
    }
}

/// The single static collider of the world
#[derive(Debug, Clone, PartialEq)]
pub enum Ground {
    Flat { height: f64 },
    Heightfield(Heightfield),
}

impl Default for Ground {
    fn default() -> Self {
        Ground::Flat { height: 0.0 }
    }
}

impl Ground {
    /// Ground for an optional terrain definition; malformed grids fall back to flat
    pub fn from_definition(definition: Option<&TerrainDefinition>) -> Self {
        let Some(def) = definition else {
            return Ground::default();
        };
        match Heightfield::new(def.size, def.resolution, def.heights.clone()) {
            Some(field) => Ground::Heightfield(field),
            None => {
                warn!(
                    "Terrain '{}' is malformed (size {}, resolution {}, {} samples), using flat ground",
                    def.name,
                    def.size,
                    def.resolution,
                    def.heights.len()
                );
                Ground::default()
            }
        }
    }

    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        match self {
            Ground::Flat { height } => *height,
            Ground::Heightfield(field) => field.height_at(x, z),
        }
    }

    /// Clearance of a sphere above the ground (negative when penetrating)
    #[inline]
    pub fn clearance(&self, centre: Vec3, radius: f64) -> f64 {
        centre.y - radius - self.height_at(centre.x, centre.z)
    }

    /// First point where a sphere moving from `from` to `to` touches the ground.
    ///
    /// Samples the segment every `step` metres, then bisects the bracketing
    /// interval. Returns the surface point below the sphere centre.
    pub fn march_segment(&self, from: Vec3, to: Vec3, radius: f64, step: f64) -> Option<Vec3> {
        if self.clearance(from, radius) <= 0.0 {
            return Some(self.surface_below(from));
        }

        let length = from.distance_to(to);
        let samples = ((length / step.max(1e-3)).ceil() as usize).max(1);
        let mut prev_t = 0.0;

        for i in 1..=samples {
            let t = i as f64 / samples as f64;
            if self.clearance(from.lerp(to, t), radius) <= 0.0 {
                let (mut lo, mut hi) = (prev_t, t);
                for _ in 0..16 {
                    let mid = (lo + hi) * 0.5;
                    if self.clearance(from.lerp(to, mid), radius) <= 0.0 {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                return Some(self.surface_below(from.lerp(to, hi)));
            }
            prev_t = t;
        }
        None
    }

    #[inline]
    fn surface_below(&self, point: Vec3) -> Vec3 {
        Vec3::new(point.x, self.height_at(point.x, point.z), point.z)
    }
}
