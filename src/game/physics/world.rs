//! Rigid body world
//!
//! Owns one static ground collider, a box body per tank and a sphere body per
//! projectile. Each step integrates every body, runs the swept and broad-phase
//! contact passes, expires stale projectiles and reports what happened.

use std::fmt;

use hashbrown::HashMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::game::constants::{collision, physics, projectile};
use crate::game::ecs::TankStats;
use crate::game::SessionId;
use crate::util::vec3::Vec3;

use super::body::{
    BodyKind, ContactEvent, ContactKind, ProjectileBody, ProjectileId, ProjectileRemoval,
    ProjectileSnapshot, RemovalReason, RigidBody, Shape, SpawnProjectileOptions, StepResult,
    TankBody, TankKinematics, TankSnapshot, TankStateUpdate,
};
use super::material::ContactMaterial;
use super::spatial::{SpatialEntity, SpatialEntityId, SpatialGrid};
use super::sweep::{segment_vs_box, sphere_vs_box};
use super::terrain::Ground;

/// Tunables for a world instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub gravity: f64,
    pub default_lifetime_ms: f64,
    pub out_of_bounds_y: f64,
    pub grid_cell_size: f64,
    pub terrain_march_step: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: physics::GRAVITY,
            default_lifetime_ms: projectile::DEFAULT_LIFETIME_MS,
            out_of_bounds_y: physics::OUT_OF_BOUNDS_Y,
            grid_cell_size: collision::GRID_CELL_SIZE,
            terrain_march_step: collision::TERRAIN_MARCH_STEP,
        }
    }
}

/// Any collider in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyId {
    Ground,
    Tank(SessionId),
    Projectile(ProjectileId),
}

impl BodyId {
    pub fn kind(&self) -> BodyKind {
        match self {
            BodyId::Ground => BodyKind::Ground,
            BodyId::Tank(_) => BodyKind::Tank,
            BodyId::Projectile(_) => BodyKind::Projectile,
        }
    }
}

impl From<SpatialEntityId> for BodyId {
    fn from(id: SpatialEntityId) -> Self {
        match id {
            SpatialEntityId::Tank(session) => BodyId::Tank(session),
            SpatialEntityId::Projectile(id) => BodyId::Projectile(id),
        }
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyId::Ground => write!(f, "ground:0"),
            BodyId::Tank(session) => write!(f, "tank:{}", session),
            BodyId::Projectile(id) => write!(f, "projectile:{}", id),
        }
    }
}

/// Canonical contact pair, projectile first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub source: BodyId,
    pub target: BodyId,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Contact candidate gathered before it is recorded
struct PendingContact {
    a: BodyId,
    b: BodyId,
    point: Vec3,
    relative_speed: f64,
    swept: bool,
}

pub struct PhysicsWorld {
    config: WorldConfig,
    ground: Ground,
    tanks: HashMap<SessionId, TankBody>,
    projectiles: HashMap<ProjectileId, ProjectileBody>,
    grid: SpatialGrid,
    /// Pair keys recorded this step
    contact_keys: FxHashSet<PairKey>,
    contacts: Vec<ContactEvent>,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig, ground: Ground) -> Self {
        Self {
            grid: SpatialGrid::new(config.grid_cell_size),
            config,
            ground,
            tanks: HashMap::new(),
            projectiles: HashMap::new(),
            contact_keys: FxHashSet::default(),
            contacts: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[inline]
    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    pub fn set_ground(&mut self, ground: Ground) {
        self.ground = ground;
    }

    #[inline]
    pub fn ground_height(&self, x: f64, z: f64) -> f64 {
        self.ground.height_at(x, z)
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    // ========================================================================
    // Tanks
    // ========================================================================

    /// Create the tank's box body, or reshape it in place if it already exists
    ///
    /// Mass follows the hull volume. Damping is the same for every tank class.
    pub fn register_tank(&mut self, session: SessionId, stats: &TankStats, state: TankKinematics) {
        let mass = (stats.body.volume() * physics::TANK_DENSITY).max(physics::TANK_MIN_MASS);
        let shape = Shape::Box {
            half_extents: stats.body.half_extents(),
        };

        match self.tanks.get_mut(&session) {
            Some(tank) => {
                tank.body.shape = shape;
                tank.body.mass = mass;
                tank.body.inv_mass = 1.0 / mass;
                tank.hull = stats.body;
                tank.turret = stats.turret;
                Self::apply_kinematics(tank, state);
                debug!("Reshaped tank body for {}", session);
            }
            None => {
                let mut tank = TankBody {
                    session,
                    body: RigidBody::new(
                        shape,
                        mass,
                        physics::TANK_LINEAR_DAMPING,
                        physics::TANK_ANGULAR_DAMPING,
                    ),
                    hull: stats.body,
                    turret: stats.turret,
                    turret_yaw: 0.0,
                    gun_pitch: 0.0,
                };
                Self::apply_kinematics(&mut tank, state);
                self.tanks.insert(session, tank);
                debug!("Registered tank body for {} (mass {:.0} kg)", session, mass);
            }
        }
    }

    fn apply_kinematics(tank: &mut TankBody, state: TankKinematics) {
        tank.body.position = state.position;
        tank.body.velocity = state.velocity;
        tank.body.yaw = state.hull_yaw;
        tank.turret_yaw = state.turret_yaw;
        tank.gun_pitch = state.gun_pitch;
    }

    /// Merge a partial kinematic update. Returns false if the tank is unknown.
    pub fn update_tank_state(&mut self, session: SessionId, update: TankStateUpdate) -> bool {
        let Some(tank) = self.tanks.get_mut(&session) else {
            return false;
        };
        if let Some(position) = update.position.filter(Vec3::is_finite) {
            tank.body.position = position;
        }
        if let Some(velocity) = update.velocity.filter(Vec3::is_finite) {
            tank.body.velocity = velocity;
        }
        if let Some(yaw) = update.hull_yaw.filter(|v| v.is_finite()) {
            tank.body.yaw = yaw;
        }
        if let Some(rate) = update.yaw_rate.filter(|v| v.is_finite()) {
            tank.body.yaw_rate = rate;
        }
        if let Some(yaw) = update.turret_yaw.filter(|v| v.is_finite()) {
            tank.turret_yaw = yaw;
        }
        if let Some(pitch) = update.gun_pitch.filter(|v| v.is_finite()) {
            tank.gun_pitch = pitch;
        }
        true
    }

    pub fn remove_tank(&mut self, session: SessionId) -> bool {
        self.tanks.remove(&session).is_some()
    }

    pub fn tank(&self, session: SessionId) -> Option<TankKinematics> {
        self.tanks.get(&session).map(TankBody::kinematics)
    }

    // ========================================================================
    // Projectiles
    // ========================================================================

    /// Add a sphere body for a fired shell
    pub fn spawn_projectile(&mut self, options: SpawnProjectileOptions) -> ProjectileSnapshot {
        let id = options.id.unwrap_or_else(ProjectileId::new);
        let radius = options
            .radius
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(projectile::DEFAULT_RADIUS);
        let mass = options
            .mass
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(projectile::DEFAULT_MASS);
        let lifetime_ms = options
            .lifetime_ms
            .filter(|l| l.is_finite() && *l > 0.0)
            .unwrap_or(self.config.default_lifetime_ms);

        let mut body = RigidBody::new(
            Shape::Sphere { radius },
            mass,
            physics::PROJECTILE_LINEAR_DAMPING,
            0.0,
        );
        body.position = options.position;
        body.velocity = options.velocity;

        let projectile = ProjectileBody {
            id,
            body,
            radius,
            shooter: options.shooter,
            ammo: options.ammo,
            spawned_at_ms: options.now_ms,
            lifetime_ms,
            previous_position: options.position,
        };
        let snapshot = projectile.snapshot();
        self.projectiles.insert(id, projectile);
        snapshot
    }

    /// Remove a projectile body. `None` when it was already removed.
    pub fn remove_projectile(
        &mut self,
        id: ProjectileId,
        reason: RemovalReason,
    ) -> Option<ProjectileRemoval> {
        let projectile = self.projectiles.remove(&id)?;
        Some(ProjectileRemoval {
            id,
            reason,
            snapshot: projectile.snapshot(),
        })
    }

    pub fn projectile(&self, id: ProjectileId) -> Option<ProjectileSnapshot> {
        self.projectiles.get(&id).map(ProjectileBody::snapshot)
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    /// Contact callback, invoked for both orderings of a touching pair.
    ///
    /// Only contacts involving a projectile are recorded; each canonical pair
    /// is reported once per step. Returns true if a new contact was recorded.
    pub fn begin_contact(
        &mut self,
        a: BodyId,
        b: BodyId,
        point: Vec3,
        relative_speed: f64,
        swept: bool,
    ) -> bool {
        let (projectile_id, other) = match (a, b) {
            (BodyId::Projectile(id), other) | (other, BodyId::Projectile(id)) => (id, other),
            _ => return false,
        };
        let kind = match other {
            BodyId::Tank(target) => ContactKind::Tank { target },
            BodyId::Ground => ContactKind::Terrain,
            BodyId::Projectile(_) => return false,
        };
        if ContactMaterial::between(BodyKind::Projectile, other.kind()).is_none() {
            return false;
        }

        let Some(projectile) = self.projectiles.get(&projectile_id) else {
            return false;
        };
        if matches!(kind, ContactKind::Tank { target } if target == projectile.shooter) {
            return false;
        }

        let key = PairKey {
            source: BodyId::Projectile(projectile_id),
            target: other,
        };
        if !self.contact_keys.insert(key) {
            return false;
        }

        debug!("Contact {} at ({:.2}, {:.2}, {:.2})", key, point.x, point.y, point.z);
        self.contacts.push(ContactEvent {
            kind,
            projectile: projectile_id,
            shooter: projectile.shooter,
            ammo: projectile.ammo.clone(),
            point,
            relative_speed,
            swept,
        });
        true
    }

    /// Swept projectile-vs-tank pass over every projectile, in id order
    fn sweep_tanks(&self) -> Vec<PendingContact> {
        let mut ids: Vec<&ProjectileId> = self.projectiles.keys().collect();
        ids.sort_unstable();

        let mut hits = Vec::new();
        for id in ids {
            let projectile = &self.projectiles[id];
            let from = projectile.previous_position;
            let to = projectile.body.position;
            let pad = Vec3::new(projectile.radius, projectile.radius, projectile.radius);

            let mut best: Option<(f64, &TankBody, Vec3)> = None;
            for tank in self.tanks.values() {
                if tank.session == projectile.shooter {
                    continue;
                }
                let (centre, half, yaw) = tank.hit_box();
                let Some(hit) = segment_vs_box(from, to, centre, half + pad, yaw) else {
                    continue;
                };
                let closer = match best {
                    None => true,
                    Some((t, other, _)) => hit.t < t || (hit.t == t && tank.session < other.session),
                };
                if closer {
                    best = Some((hit.t, tank, hit.point));
                }
            }

            if let Some((_, tank, point)) = best {
                hits.push(PendingContact {
                    a: BodyId::Projectile(*id),
                    b: BodyId::Tank(tank.session),
                    point,
                    relative_speed: (projectile.body.velocity - tank.body.velocity).length(),
                    swept: true,
                });
            }
        }
        hits
    }

    /// Overlap contacts from the broad phase at end-of-step positions
    fn broad_phase_contacts(&mut self) -> Vec<PendingContact> {
        self.grid.clear();
        for tank in self.tanks.values() {
            self.grid.insert(SpatialEntity {
                id: SpatialEntityId::Tank(tank.session),
                position: tank.body.position,
                radius: 0.5 * (tank.hull.width.powi(2) + tank.hull.length.powi(2)).sqrt(),
            });
        }
        for projectile in self.projectiles.values() {
            self.grid.insert(SpatialEntity {
                id: SpatialEntityId::Projectile(projectile.id),
                position: projectile.body.position,
                radius: projectile.radius,
            });
        }

        let mut pairs: SmallVec<[(SpatialEntityId, SpatialEntityId); 16]> = SmallVec::new();
        self.grid.for_each_potential_collision(|a, b| pairs.push((a.id, b.id)));

        let mut found = Vec::new();
        for (a, b) in pairs {
            let (projectile_id, session) = match (a, b) {
                (SpatialEntityId::Projectile(p), SpatialEntityId::Tank(t))
                | (SpatialEntityId::Tank(t), SpatialEntityId::Projectile(p)) => (p, t),
                _ => continue,
            };
            let (Some(projectile), Some(tank)) =
                (self.projectiles.get(&projectile_id), self.tanks.get(&session))
            else {
                continue;
            };
            let (centre, half, yaw) = tank.hit_box();
            if sphere_vs_box(projectile.body.position, projectile.radius, centre, half, yaw) {
                found.push(PendingContact {
                    a: a.into(),
                    b: b.into(),
                    point: projectile.body.position,
                    relative_speed: (projectile.body.velocity - tank.body.velocity).length(),
                    swept: false,
                });
            }
        }
        found
    }

    /// Segment-vs-heightfield pass for projectiles without a tank contact
    fn terrain_contacts(&self, skip: &FxHashSet<ProjectileId>) -> Vec<PendingContact> {
        let mut ids: Vec<&ProjectileId> = self.projectiles.keys().collect();
        ids.sort_unstable();

        ids.into_iter()
            .filter(|id| !skip.contains(*id))
            .filter_map(|id| {
                let projectile = &self.projectiles[id];
                let point = self.ground.march_segment(
                    projectile.previous_position,
                    projectile.body.position,
                    projectile.radius,
                    self.config.terrain_march_step,
                )?;
                Some(PendingContact {
                    a: BodyId::Projectile(*id),
                    b: BodyId::Ground,
                    point,
                    relative_speed: projectile.body.velocity.length(),
                    swept: true,
                })
            })
            .collect()
    }

    /// Keep one contact per projectile, tank contacts beating terrain
    fn reduce_contacts(contacts: Vec<ContactEvent>) -> Vec<ContactEvent> {
        let mut chosen: FxHashMap<ProjectileId, usize> = FxHashMap::default();
        let mut reduced: Vec<ContactEvent> = Vec::with_capacity(contacts.len());
        for contact in contacts {
            match chosen.get(&contact.projectile) {
                Some(&index) => {
                    if contact.is_tank() && !reduced[index].is_tank() {
                        reduced[index] = contact;
                    }
                }
                None => {
                    chosen.insert(contact.projectile, reduced.len());
                    reduced.push(contact);
                }
            }
        }
        reduced
    }

    // ========================================================================
    // Step
    // ========================================================================

    /// Advance the world by `dt` seconds; `now_ms` is the clock after the step
    pub fn step(&mut self, dt: f64, now_ms: f64) -> StepResult {
        self.contact_keys.clear();
        self.contacts.clear();

        let gravity = self.config.gravity;
        for projectile in self.projectiles.values_mut() {
            projectile.previous_position = projectile.body.position;
        }
        self.tanks
            .par_values_mut()
            .for_each(|tank| tank.body.integrate(gravity, dt));
        self.projectiles
            .par_values_mut()
            .for_each(|projectile| projectile.body.integrate(gravity, dt));

        let ground = &self.ground;
        for tank in self.tanks.values_mut() {
            resolve_tank_ground(ground, tank, gravity, dt);
        }

        // Swept hits are recorded first so their pair keys win the dedup
        for hit in self.sweep_tanks() {
            self.begin_contact(hit.a, hit.b, hit.point, hit.relative_speed, hit.swept);
        }
        for overlap in self.broad_phase_contacts() {
            self.begin_contact(overlap.a, overlap.b, overlap.point, overlap.relative_speed, false);
            self.begin_contact(overlap.b, overlap.a, overlap.point, overlap.relative_speed, false);
        }

        let hit_tanks: FxHashSet<ProjectileId> = self
            .contacts
            .iter()
            .filter(|c| c.is_tank())
            .map(|c| c.projectile)
            .collect();
        for hit in self.terrain_contacts(&hit_tanks) {
            self.begin_contact(hit.a, hit.b, hit.point, hit.relative_speed, hit.swept);
        }

        let contacts = Self::reduce_contacts(std::mem::take(&mut self.contacts));
        let contacted: FxHashSet<ProjectileId> = contacts.iter().map(|c| c.projectile).collect();

        let mut removals = Vec::new();
        let mut stale: Vec<(ProjectileId, RemovalReason)> = self
            .projectiles
            .values()
            .filter(|p| !contacted.contains(&p.id))
            .filter_map(|p| {
                if now_ms - p.spawned_at_ms > p.lifetime_ms {
                    Some((p.id, RemovalReason::Expired))
                } else if p.body.position.y < self.config.out_of_bounds_y {
                    Some((p.id, RemovalReason::OutOfBounds))
                } else {
                    None
                }
            })
            .collect();
        stale.sort_unstable_by_key(|(id, _)| *id);
        for (id, reason) in stale {
            if let Some(removal) = self.remove_projectile(id, reason) {
                removals.push(removal);
            }
        }

        let ground = &self.ground;
        for tank in self.tanks.values_mut() {
            let floor =
                ground.height_at(tank.body.position.x, tank.body.position.z) + physics::TANK_HEIGHT_FLOOR;
            if tank.body.position.y < floor {
                tank.body.position.y = floor;
            }
        }

        let mut tanks: Vec<TankSnapshot> = self
            .tanks
            .values()
            .map(|tank| TankSnapshot {
                session: tank.session,
                state: tank.kinematics(),
            })
            .collect();
        tanks.sort_unstable_by_key(|t| t.session);

        let mut projectiles: Vec<ProjectileSnapshot> =
            self.projectiles.values().map(ProjectileBody::snapshot).collect();
        projectiles.sort_unstable_by_key(|p| p.id);

        StepResult {
            contacts,
            removals,
            tanks,
            projectiles,
        }
    }
}

/// Keep a tank resting on the ground, applying tank/ground friction
fn resolve_tank_ground(ground: &Ground, tank: &mut TankBody, gravity: f64, dt: f64) {
    let material = ContactMaterial::TANK_GROUND;
    let surface = ground.height_at(tank.body.position.x, tank.body.position.z);
    let rest_y = surface + tank.half_height();

    if tank.body.position.y > rest_y {
        return;
    }
    tank.body.position.y = rest_y;
    if tank.body.velocity.y < 0.0 {
        tank.body.velocity.y = -tank.body.velocity.y * material.restitution;
    }

    // Coulomb friction on the horizontal velocity
    let horizontal = tank.body.velocity.horizontal();
    let speed = horizontal.length();
    if speed > 0.0 {
        let slowed = (speed - material.friction * gravity.abs() * dt).max(0.0);
        let scaled = horizontal * (slowed / speed);
        tank.body.velocity.x = scaled.x;
        tank.body.velocity.z = scaled.z;
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("tanks", &self.tanks.len())
            .field("projectiles", &self.projectiles.len())
            .finish()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default(), Ground::default())
    }
}
