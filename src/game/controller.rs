//! Simulation controller
//!
//! Owns the component store, the physics world and the table binding one to
//! the other. Everything that changes simulation state goes through here:
//! player lifecycle, fire and move intents, and the fixed-timestep tick that
//! turns raw physics contacts into damage, explosions and removals.

use std::f64::consts::TAU;
use std::mem;
use std::sync::Arc;

use hashbrown::HashMap;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::catalog::{AmmoDefinition, Catalog, StatsStore, TankDefinition};
use crate::config::SimConfig;
use crate::game::constants::{spawn, tank};
use crate::game::ecs::{
    AmmoRack, AmmoRounds, ComponentStore, Cooldown, DriveInput, Entity, Health, ProjectileState,
    TankStats, Transform, Velocity,
};
use crate::game::events::{ProjectileOutcome, SimEvent, TickReport};
use crate::game::input_buffer::{IntentBuffer, IntentKind, IntentSender, MoveIntent};
use crate::game::ownership::{BodyRef, OwnershipTable};
use crate::game::physics::{
    ContactEvent, ContactKind, Ground, PhysicsWorld, ProjectileId, RemovalReason,
    SpawnProjectileOptions, TankKinematics, WorldConfig,
};
use crate::game::systems::{damage, fire, movement};
use crate::game::SessionId;
use crate::net::snapshot::{encode_snapshot, SnapshotBuffer};
use crate::util::vec3::Vec3;

/// Controller tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub world: WorldConfig,
    pub projectile_lifetime_ms: f64,
    pub intent_buffer_capacity: usize,
    pub remove_on_death: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        SimConfig::default().into()
    }
}

impl From<&SimConfig> for ControllerConfig {
    fn from(config: &SimConfig) -> Self {
        Self {
            world: WorldConfig {
                gravity: config.gravity,
                default_lifetime_ms: config.projectile_lifetime_ms,
                ..WorldConfig::default()
            },
            projectile_lifetime_ms: config.projectile_lifetime_ms,
            intent_buffer_capacity: config.intent_buffer_capacity,
            remove_on_death: config.remove_on_death,
        }
    }
}

impl From<SimConfig> for ControllerConfig {
    fn from(config: SimConfig) -> Self {
        (&config).into()
    }
}

pub struct SimulationController {
    config: ControllerConfig,
    store: ComponentStore,
    world: PhysicsWorld,
    catalog: Arc<dyn Catalog>,
    stats: Arc<dyn StatsStore>,
    intents: IntentBuffer,
    ownership: OwnershipTable,
    /// Player name per session, for logs
    tank_names: HashMap<SessionId, String>,
    tick: u64,
    clock_ms: f64,
    /// Events produced by direct calls between ticks
    pending_events: Vec<SimEvent>,
}

impl SimulationController {
    pub fn new(config: ControllerConfig, catalog: Arc<dyn Catalog>, stats: Arc<dyn StatsStore>) -> Self {
        let ground = Ground::from_definition(catalog.terrain());
        info!(
            "Simulation controller ready ({} tanks, {} ammo types in catalog)",
            catalog.tanks().len(),
            catalog.ammo().len()
        );
        Self {
            world: PhysicsWorld::new(config.world, ground),
            intents: IntentBuffer::new(config.intent_buffer_capacity),
            config,
            store: ComponentStore::new(),
            catalog,
            stats,
            ownership: OwnershipTable::new(),
            tank_names: HashMap::new(),
            tick: 0,
            clock_ms: 0.0,
            pending_events: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    #[inline]
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    #[inline]
    pub fn tank_entity(&self, session: SessionId) -> Option<Entity> {
        self.ownership.tank_entity(session)
    }

    #[inline]
    pub fn projectile_entity(&self, id: ProjectileId) -> Option<Entity> {
        self.ownership.projectile_entity(id)
    }

    pub fn player_count(&self) -> usize {
        self.tank_names.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.world.projectile_count()
    }

    pub fn sessions(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.tank_names.keys().copied()
    }

    /// Sender handle for network handlers
    pub fn intent_sender(&self) -> IntentSender {
        self.intents.sender()
    }

    // ========================================================================
    // Player lifecycle
    // ========================================================================

    /// Stats for `definition`, with malformed values replaced from the catalog's
    /// canonical entry for the same tank (or the built-in defaults)
    fn sanitize_stats(&self, definition: &TankDefinition) -> TankStats {
        let (canonical, _) = self
            .catalog
            .tank(&definition.name)
            .map(TankDefinition::effective_stats)
            .unwrap_or_default()
            .sanitized(&TankStats::default());
        let (stats, replaced) = definition.effective_stats().sanitized(&canonical);
        if !replaced.is_empty() {
            warn!(
                "Tank '{}' had malformed stats {:?}, replaced with canonical values",
                definition.name, replaced
            );
        }
        stats
    }

    /// Drop loadout entries for ammo the catalog does not know
    fn validate_loadout(&self, loadout: &[AmmoRounds]) -> Vec<AmmoRounds> {
        loadout
            .iter()
            .filter(|entry| {
                let known = self.catalog.find_ammo(&entry.name).is_some();
                if !known {
                    warn!("Dropping unknown ammo '{}' from loadout", entry.name);
                }
                known
            })
            .cloned()
            .collect()
    }

    fn random_spawn(&self) -> (Vec3, f64) {
        let mut rng = rand::thread_rng();
        let angle = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(spawn::ZONE_MIN..spawn::ZONE_MAX);
        let x = angle.cos() * distance;
        let z = angle.sin() * distance;
        // Face the arena centre
        (Vec3::new(x, 0.0, z), x.atan2(z))
    }

    /// Add a tank for `session`. Returns `None` if the session already has one.
    ///
    /// `spawn` gives the x/z placement; the tank always rests on the ground.
    /// Without it a random point in the spawn ring is used.
    pub fn add_player(
        &mut self,
        session: SessionId,
        definition: &TankDefinition,
        loadout: &[AmmoRounds],
        spawn: Option<Vec3>,
    ) -> Option<Entity> {
        if self.ownership.tank_entity(session).is_some() {
            debug!("Session {} already has a tank", session);
            return None;
        }

        let stats = self.sanitize_stats(definition);
        let loadout = self.validate_loadout(loadout);
        let (placement, hull_yaw) = match spawn.filter(Vec3::is_finite) {
            Some(position) => (position, 0.0),
            None => self.random_spawn(),
        };
        let position = Vec3::new(
            placement.x,
            self.world.ground_height(placement.x, placement.z) + stats.body.height / 2.0,
            placement.z,
        );

        let entity = self.store.create_entity();
        let transform = Transform {
            position,
            hull_yaw,
            turret_yaw: 0.0,
            gun_pitch: 0.0,
        };
        self.store.set_transform(entity, transform);
        self.store.set_velocity(entity, Velocity::default());
        self.store.set_health(entity, Health::new(stats.max_health));
        self.store.set_ammo(entity, AmmoRack::from_loadout(&loadout));
        self.store.set_cooldown(entity, Cooldown::default());
        self.store.set_tank_stats(entity, stats);
        self.store.set_drive(entity, DriveInput::default());

        self.world.register_tank(
            session,
            &stats,
            TankKinematics {
                position,
                hull_yaw,
                ..Default::default()
            },
        );
        self.ownership.bind(entity, BodyRef::Tank(session));
        self.tank_names.insert(session, definition.name.clone());

        info!(
            "Player {} joined with '{}' at ({:.1}, {:.1}, {:.1})",
            session, definition.name, position.x, position.y, position.z
        );
        Some(entity)
    }

    /// Remove a player's tank. In-flight shells keep flying.
    pub fn remove_player(&mut self, session: SessionId) -> bool {
        let Some(entity) = self.ownership.unbind_body(BodyRef::Tank(session)) else {
            return false;
        };
        self.world.remove_tank(session);
        self.store.destroy_entity(entity);
        self.tank_names.remove(&session);
        info!("Player {} removed", session);
        true
    }

    /// Swap a live tank's definition, keeping its position and health ratio
    pub fn change_tank(&mut self, session: SessionId, definition: &TankDefinition) -> bool {
        let Some(entity) = self.ownership.tank_entity(session) else {
            return false;
        };
        let stats = self.sanitize_stats(definition);

        let Some(mut transform) = self.store.transform(entity).copied() else {
            return false;
        };
        transform.turret_yaw = stats.clamp_turret_yaw(transform.turret_yaw);
        transform.gun_pitch = stats.clamp_gun_pitch(transform.gun_pitch);

        if let Some(health) = self.store.health_mut(entity) {
            let ratio = if health.max > 0.0 { health.current / health.max } else { 1.0 };
            health.set(ratio * stats.max_health, stats.max_health);
        }
        self.store.set_tank_stats(entity, stats);
        self.store.set_transform(entity, transform);

        let velocity = self.store.velocity(entity).map(|v| v.linear).unwrap_or_default();
        self.world.register_tank(
            session,
            &stats,
            TankKinematics {
                position: transform.position,
                velocity,
                hull_yaw: transform.hull_yaw,
                turret_yaw: transform.turret_yaw,
                gun_pitch: transform.gun_pitch,
            },
        );
        self.tank_names.insert(session, definition.name.clone());
        info!("Player {} switched to '{}'", session, definition.name);
        true
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Queue a fire intent for the next tick. False when the buffer is full.
    pub fn submit_fire(&self, session: SessionId, ammo: impl Into<String>) -> bool {
        self.intents.try_submit(session, IntentKind::Fire { ammo: ammo.into() })
    }

    /// Queue a move intent for the next tick. False when the buffer is full.
    pub fn submit_move(&self, session: SessionId, intent: MoveIntent) -> bool {
        self.intents.try_submit(session, IntentKind::Move(intent))
    }

    /// Store the drive input applied from the next tick on
    pub fn apply_move(&mut self, session: SessionId, intent: MoveIntent) -> bool {
        let Some(entity) = self.ownership.tank_entity(session) else {
            debug!("Move rejected for {}: no tank", session);
            return false;
        };
        self.store
            .set_drive(entity, movement::clamp_input(DriveInput::from(intent)))
    }

    /// Fire immediately. Returns the new projectile id, or `None` when rejected.
    pub fn fire(&mut self, session: SessionId, ammo_name: &str) -> Option<ProjectileId> {
        let Some(entity) = self.ownership.tank_entity(session) else {
            debug!("Fire rejected for {}: {}", session, fire::FireRejection::MissingTank);
            return None;
        };
        let Some(ammo) = self.catalog.find_ammo(ammo_name).cloned() else {
            debug!("Fire rejected for {}: {} '{}'", session, fire::FireRejection::UnknownAmmo, ammo_name);
            return None;
        };

        let muzzle = match fire::try_fire(&mut self.store, entity, &ammo) {
            Ok(muzzle) => muzzle,
            Err(rejection) => {
                debug!("Fire rejected for {}: {}", session, rejection);
                return None;
            }
        };

        let snapshot = self.world.spawn_projectile(SpawnProjectileOptions {
            position: muzzle.position,
            velocity: muzzle.velocity,
            shooter: session,
            ammo: ammo.name.clone(),
            lifetime_ms: Some(self.config.projectile_lifetime_ms),
            now_ms: self.clock_ms,
            ..Default::default()
        });

        let shell = self.store.create_entity();
        self.store
            .set_transform(shell, projectile_transform(muzzle.position, muzzle.velocity));
        self.store.set_velocity(
            shell,
            Velocity {
                linear: muzzle.velocity,
            },
        );
        self.store.set_projectile(
            shell,
            ProjectileState {
                projectile_id: snapshot.id,
                shooter: session,
                ammo: ammo.name.clone(),
                lifetime_remaining: snapshot.lifetime_ms / 1000.0,
            },
        );
        self.ownership.bind(shell, BodyRef::Projectile(snapshot.id));

        debug!("{} fired {} ({})", session, ammo.name, snapshot.id);
        self.pending_events.push(SimEvent::ProjectileFired {
            projectile_id: snapshot.id,
            entity: shell,
            shooter: session,
            ammo: ammo.name,
            position: muzzle.position,
            velocity: muzzle.velocity,
        });
        Some(snapshot.id)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by `dt` seconds
    pub fn tick(&mut self, dt: f64) -> TickReport {
        self.tick += 1;

        let tanks: Vec<Entity> = self.store.tanks().collect();
        for &entity in &tanks {
            if let Some(cooldown) = self.store.cooldown_mut(entity) {
                cooldown.decay(dt);
            }
        }

        for intent in self.intents.drain() {
            match intent.kind {
                IntentKind::Fire { ammo } => {
                    self.fire(intent.session, &ammo);
                }
                IntentKind::Move(movement) => {
                    self.apply_move(intent.session, movement);
                }
            }
        }
        let mut events = mem::take(&mut self.pending_events);

        self.drive_tanks(dt);

        let shells: Vec<Entity> = self.store.projectiles().collect();
        for entity in shells {
            if let Some(state) = self.store.projectile_mut(entity) {
                state.lifetime_remaining -= dt;
            }
        }

        self.clock_ms += dt * 1000.0;
        let result = self.world.step(dt, self.clock_ms);

        for snapshot in &result.tanks {
            let Some(entity) = self.ownership.tank_entity(snapshot.session) else {
                continue;
            };
            let state = snapshot.state;
            self.store.set_transform(
                entity,
                Transform {
                    position: state.position,
                    hull_yaw: state.hull_yaw,
                    turret_yaw: state.turret_yaw,
                    gun_pitch: state.gun_pitch,
                },
            );
            self.store.set_velocity(
                entity,
                Velocity {
                    linear: state.velocity,
                },
            );
        }
        for snapshot in &result.projectiles {
            let Some(entity) = self.ownership.projectile_entity(snapshot.id) else {
                continue;
            };
            self.store
                .set_transform(entity, projectile_transform(snapshot.position, snapshot.velocity));
            self.store.set_velocity(
                entity,
                Velocity {
                    linear: snapshot.velocity,
                },
            );
        }

        for contact in result.contacts {
            self.resolve_contact(contact, &mut events);
        }

        for removal in result.removals {
            if let Some(entity) = self.ownership.unbind_body(BodyRef::Projectile(removal.id)) {
                self.store.destroy_entity(entity);
            }
            let outcome = match removal.reason {
                RemovalReason::OutOfBounds => ProjectileOutcome::OutOfBounds,
                _ => ProjectileOutcome::Timeout,
            };
            debug!("Projectile {} resolved: {}", removal.id, outcome.as_str());
            events.push(SimEvent::ProjectileResolved {
                projectile_id: removal.id,
                shooter: removal.snapshot.shooter,
                ammo: removal.snapshot.ammo,
                position: removal.snapshot.position,
                outcome,
            });
        }

        if self.config.remove_on_death {
            let dead: Vec<SessionId> = self
                .tank_names
                .keys()
                .copied()
                .filter(|session| {
                    self.ownership
                        .tank_entity(*session)
                        .and_then(|entity| self.store.health(entity))
                        .map_or(false, Health::is_destroyed)
                })
                .collect();
            for session in dead {
                self.remove_player(session);
            }
        }

        TickReport {
            tick: self.tick,
            events,
        }
    }

    /// Apply each live tank's drive input to its physics body
    fn drive_tanks(&mut self, dt: f64) {
        let sessions: Vec<SessionId> = self.tank_names.keys().copied().collect();
        for session in sessions {
            let Some(entity) = self.ownership.tank_entity(session) else {
                continue;
            };
            let (Some(transform), Some(stats)) = (self.store.transform(entity), self.store.tank_stats(entity))
            else {
                continue;
            };
            let alive = self.store.health(entity).map_or(false, |h| !h.is_destroyed());
            let input = if alive {
                self.store.drive(entity).copied().unwrap_or_default()
            } else {
                DriveInput {
                    turret_yaw_target: transform.turret_yaw,
                    gun_pitch_target: transform.gun_pitch,
                    ..Default::default()
                }
            };
            let vertical = self.world.tank(session).map_or(0.0, |state| state.velocity.y);
            let update = movement::drive(transform, vertical, stats, &input, dt);
            self.world.update_tank_state(session, update);
        }
    }

    /// Turn one physics contact into removal, damage and explosion events
    fn resolve_contact(&mut self, contact: ContactEvent, events: &mut Vec<SimEvent>) {
        // Already resolved (removed earlier this tick or by a manual removal)
        let Some(removal) = self
            .world
            .remove_projectile(contact.projectile, RemovalReason::Collision)
        else {
            return;
        };
        if let Some(entity) = self.ownership.unbind_body(BodyRef::Projectile(removal.id)) {
            self.store.destroy_entity(entity);
        }

        let ammo: Option<AmmoDefinition> = self.catalog.find_ammo(&contact.ammo).cloned();
        let outcome = match contact.kind {
            ContactKind::Tank { target } => {
                let damage = match &ammo {
                    Some(ammo) => self.damage_tank(target, &contact, ammo, events),
                    None => 0.0,
                };
                ProjectileOutcome::Tank {
                    hit_session_id: target,
                    damage,
                }
            }
            ContactKind::Terrain => ProjectileOutcome::Terrain,
        };

        events.push(SimEvent::Explosion {
            projectile_id: removal.id,
            shooter: contact.shooter,
            ammo: contact.ammo.clone(),
            position: contact.point,
            radius: ammo.as_ref().map_or(0.0, |a| a.explosion_radius),
        });
        debug!("Projectile {} resolved: {}", removal.id, outcome.as_str());
        events.push(SimEvent::ProjectileResolved {
            projectile_id: removal.id,
            shooter: contact.shooter,
            ammo: contact.ammo,
            position: contact.point,
            outcome,
        });
    }

    /// Apply a shell hit to `target`. Returns the damage dealt (0 if the tank is gone).
    fn damage_tank(
        &mut self,
        target: SessionId,
        contact: &ContactEvent,
        ammo: &AmmoDefinition,
        events: &mut Vec<SimEvent>,
    ) -> f64 {
        let Some(entity) = self.ownership.tank_entity(target) else {
            return 0.0;
        };
        let armor = self.store.tank_stats(entity).map_or(tank::ARMOR, |s| s.armor);
        let Some(hit) = self
            .store
            .health_mut(entity)
            .map(|health| damage::apply_hit(health, ammo, armor))
        else {
            return 0.0;
        };

        events.push(SimEvent::Damage {
            shooter_session: contact.shooter,
            target_session: target,
            ammo: ammo.name.clone(),
            damage: hit.damage,
            penetrated: hit.penetrated,
            remaining_health: hit.remaining_health,
            point: contact.point,
        });

        if hit.destroyed {
            self.stats.record_kill(contact.shooter);
            self.stats.record_death(target);
            info!("Tank {} destroyed by {}", target, contact.shooter);
            events.push(SimEvent::TankDestroyed {
                session: target,
                killer: contact.shooter,
            });
        }
        hit.damage
    }

    /// Encode the current store for broadcast
    pub fn snapshot(&self) -> SnapshotBuffer {
        encode_snapshot(&self.store, self.tick)
    }
}

/// Projectile transform with yaw/pitch along its flight direction
fn projectile_transform(position: Vec3, velocity: Vec3) -> Transform {
    let direction = velocity.normalize();
    Transform {
        position,
        hull_yaw: (-direction.x).atan2(-direction.z),
        turret_yaw: 0.0,
        gun_pitch: direction.y.clamp(-1.0, 1.0).asin(),
    }
}
