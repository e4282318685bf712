use serde::{Deserialize, Serialize};

use crate::game::ecs::Entity;
use crate::game::physics::ProjectileId;
use crate::game::SessionId;
use crate::util::vec3::Vec3;

/// How a projectile's flight ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectileOutcome {
    Tank { hit_session_id: SessionId, damage: f64 },
    Terrain,
    Timeout,
    OutOfBounds,
}

impl ProjectileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectileOutcome::Tank { .. } => "tank",
            ProjectileOutcome::Terrain => "terrain",
            ProjectileOutcome::Timeout => "timeout",
            ProjectileOutcome::OutOfBounds => "out-of-bounds",
        }
    }
}

/// Something that happened during a tick, for broadcast and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    ProjectileFired {
        projectile_id: ProjectileId,
        entity: Entity,
        shooter: SessionId,
        ammo: String,
        position: Vec3,
        velocity: Vec3,
    },
    Damage {
        shooter_session: SessionId,
        target_session: SessionId,
        ammo: String,
        damage: f64,
        penetrated: bool,
        remaining_health: f64,
        point: Vec3,
    },
    Explosion {
        projectile_id: ProjectileId,
        shooter: SessionId,
        ammo: String,
        position: Vec3,
        radius: f64,
    },
    TankDestroyed {
        session: SessionId,
        killer: SessionId,
    },
    ProjectileResolved {
        projectile_id: ProjectileId,
        shooter: SessionId,
        ammo: String,
        position: Vec3,
        outcome: ProjectileOutcome,
    },
}

/// Events and bookkeeping from one controller tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<SimEvent>,
}

impl TickReport {
    /// Resolution outcomes in emission order
    pub fn outcomes(&self) -> impl Iterator<Item = &ProjectileOutcome> {
        self.events.iter().filter_map(|event| match event {
            SimEvent::ProjectileResolved { outcome, .. } => Some(outcome),
            _ => None,
        })
    }

    pub fn hits(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SimEvent::Damage { .. }))
            .count()
    }

    pub fn kills(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SimEvent::TankDestroyed { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn resolved(outcome: ProjectileOutcome) -> SimEvent {
        SimEvent::ProjectileResolved {
            projectile_id: ProjectileId::new(),
            shooter: Uuid::new_v4(),
            ammo: "HE".to_string(),
            position: Vec3::ZERO,
            outcome,
        }
    }

    #[test]
    fn test_report_counts() {
        let target = Uuid::new_v4();
        let shooter = Uuid::new_v4();
        let report = TickReport {
            tick: 12,
            events: vec![
                SimEvent::Damage {
                    shooter_session: shooter,
                    target_session: target,
                    ammo: "HE".to_string(),
                    damage: 130.0,
                    penetrated: false,
                    remaining_health: 0.0,
                    point: Vec3::ZERO,
                },
                SimEvent::TankDestroyed {
                    session: target,
                    killer: shooter,
                },
                resolved(ProjectileOutcome::Tank {
                    hit_session_id: target,
                    damage: 130.0,
                }),
                resolved(ProjectileOutcome::Timeout),
            ],
        };

        assert_eq!(report.hits(), 1);
        assert_eq!(report.kills(), 1);
        let names: Vec<&str> = report.outcomes().map(ProjectileOutcome::as_str).collect();
        assert_eq!(names, vec!["tank", "timeout"]);
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(ProjectileOutcome::Terrain.as_str(), "terrain");
        assert_eq!(ProjectileOutcome::OutOfBounds.as_str(), "out-of-bounds");
    }
}
