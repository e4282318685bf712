//! Continuous collision: segment against yaw-rotated boxes

use crate::util::vec3::Vec3;

/// Hit along a swept segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the segment travelled before impact, in `[0, 1]`
    pub t: f64,
    pub point: Vec3,
}

/// Intersect the segment `from -> to` with a box rotated about y by `yaw`.
///
/// `half_extents` should already include the moving sphere's radius.
/// A segment starting inside the box reports `t = 0`.
pub fn segment_vs_box(
    from: Vec3,
    to: Vec3,
    centre: Vec3,
    half_extents: Vec3,
    yaw: f64,
) -> Option<SweepHit> {
    let local_from = (from - centre).rotate_y(-yaw);
    let local_to = (to - centre).rotate_y(-yaw);
    let delta = local_to - local_from;

    let mut t_min: f64 = 0.0;
    let mut t_max: f64 = 1.0;

    let axes = [
        (local_from.x, delta.x, half_extents.x),
        (local_from.y, delta.y, half_extents.y),
        (local_from.z, delta.z, half_extents.z),
    ];

    for (origin, dir, half) in axes {
        if dir.abs() < 1e-12 {
            if origin < -half || origin > half {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let mut t1 = (-half - origin) * inv;
        let mut t2 = (half - origin) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    Some(SweepHit {
        t: t_min,
        point: from.lerp(to, t_min),
    })
}

/// Overlap test of a sphere against a yaw-rotated box
pub fn sphere_vs_box(centre: Vec3, radius: f64, box_centre: Vec3, half_extents: Vec3, yaw: f64) -> bool {
    let local = (centre - box_centre).rotate_y(-yaw);
    let closest = Vec3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );
    (local - closest).length_sq() <= radius * radius
}
