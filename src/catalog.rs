//! Read-only game definitions and the kill/death bookkeeping collaborator
//!
//! Tank, ammo and terrain definitions are authored elsewhere and arrive as
//! JSON. The simulation only ever reads them through [`Catalog`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::game::constants::tank;
use crate::game::ecs::TankStats;
use crate::game::SessionId;

/// Shell type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmmoDefinition {
    pub name: String,
    /// Armour penetration (mm)
    pub penetration: f64,
    /// Flat damage on a direct hit
    pub damage: f64,
    #[serde(default)]
    pub explosion_radius: f64,
    /// Splash damage added to every direct hit
    #[serde(default)]
    pub explosion_damage: f64,
    /// Muzzle velocity (m/s)
    pub muzzle_velocity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TankClass {
    Light,
    #[default]
    Medium,
    Heavy,
    /// Casemate vehicles with limited gun traverse
    TankDestroyer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankDefinition {
    pub name: String,
    #[serde(default)]
    pub nation: String,
    #[serde(default)]
    pub class: TankClass,
    #[serde(flatten)]
    pub stats: TankStats,
}

impl TankDefinition {
    pub fn new(name: impl Into<String>, class: TankClass, stats: TankStats) -> Self {
        Self {
            name: name.into(),
            nation: String::new(),
            class,
            stats,
        }
    }

    /// Stats with class rules applied (tank destroyers get a traverse limit)
    pub fn effective_stats(&self) -> TankStats {
        let mut stats = self.stats;
        if self.class == TankClass::TankDestroyer && stats.turret_traverse_limit.is_none() {
            stats.turret_traverse_limit = Some(tank::TANK_DESTROYER_TRAVERSE);
        }
        stats
    }
}

/// Elevation grid, `resolution x resolution` samples over a `size` metre square
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainDefinition {
    #[serde(default)]
    pub name: String,
    pub size: f64,
    pub resolution: usize,
    pub heights: Vec<f64>,
}

/// Read-only definitions
pub trait Catalog: Send + Sync {
    fn ammo(&self) -> &[AmmoDefinition];

    fn tanks(&self) -> &[TankDefinition];

    fn terrain(&self) -> Option<&TerrainDefinition>;

    fn find_ammo(&self, name: &str) -> Option<&AmmoDefinition> {
        self.ammo().iter().find(|ammo| ammo.name == name)
    }

    fn tank(&self, name: &str) -> Option<&TankDefinition> {
        self.tanks().iter().find(|def| def.name == name)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub ammo: Vec<AmmoDefinition>,
    #[serde(default)]
    pub tanks: Vec<TankDefinition>,
    #[serde(default)]
    pub terrain: Option<TerrainDefinition>,
}

impl StaticCatalog {
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let catalog: StaticCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        info!(
            "Loaded catalog from {}: {} tanks, {} ammo types, terrain: {}",
            path.display(),
            catalog.tanks.len(),
            catalog.ammo.len(),
            catalog.terrain.as_ref().map(|t| t.name.as_str()).unwrap_or("flat")
        );
        Ok(catalog)
    }

    /// Structural checks; per-field stat problems are sanitized later instead
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (i, ammo) in self.ammo.iter().enumerate() {
            if ammo.name.is_empty() {
                return Err(CatalogError::Invalid(format!("ammo #{} has no name", i)));
            }
            if self.ammo[..i].iter().any(|other| other.name == ammo.name) {
                return Err(CatalogError::Invalid(format!("duplicate ammo '{}'", ammo.name)));
            }
            if !(ammo.muzzle_velocity.is_finite() && ammo.muzzle_velocity > 0.0) {
                return Err(CatalogError::Invalid(format!(
                    "ammo '{}' has muzzle velocity {}",
                    ammo.name, ammo.muzzle_velocity
                )));
            }
        }
        for (i, def) in self.tanks.iter().enumerate() {
            if def.name.is_empty() {
                return Err(CatalogError::Invalid(format!("tank #{} has no name", i)));
            }
            if self.tanks[..i].iter().any(|other| other.name == def.name) {
                return Err(CatalogError::Invalid(format!("duplicate tank '{}'", def.name)));
            }
        }
        Ok(())
    }

    /// Small built-in set used when no catalog file is configured
    pub fn builtin() -> Self {
        let heavy = TankStats {
            max_health: 1600.0,
            max_speed: 8.0,
            max_reverse_speed: 3.5,
            armor: 180.0,
            rounds_per_minute: 5.0,
            barrel_length: 5.2,
            turret_x_percent: 45.0,
            ..Default::default()
        };
        let destroyer = TankStats {
            max_health: 900.0,
            armor: 120.0,
            rounds_per_minute: 6.0,
            barrel_length: 5.5,
            turret_x_percent: 35.0,
            ..Default::default()
        };

        Self {
            ammo: vec![
                AmmoDefinition {
                    name: "AP".to_string(),
                    penetration: 150.0,
                    damage: 220.0,
                    explosion_radius: 0.0,
                    explosion_damage: 0.0,
                    muzzle_velocity: 820.0,
                },
                AmmoDefinition {
                    name: "HE".to_string(),
                    penetration: 40.0,
                    damage: 140.0,
                    explosion_radius: 4.0,
                    explosion_damage: 60.0,
                    muzzle_velocity: 600.0,
                },
                AmmoDefinition {
                    name: "HEAT".to_string(),
                    penetration: 220.0,
                    damage: 190.0,
                    explosion_radius: 1.0,
                    explosion_damage: 10.0,
                    muzzle_velocity: 700.0,
                },
            ],
            tanks: vec![
                TankDefinition::new("Medium", TankClass::Medium, TankStats::default()),
                TankDefinition::new("Heavy", TankClass::Heavy, heavy),
                TankDefinition::new("Destroyer", TankClass::TankDestroyer, destroyer),
            ],
            terrain: None,
        }
    }
}

impl Catalog for StaticCatalog {
    fn ammo(&self) -> &[AmmoDefinition] {
        &self.ammo
    }

    fn tanks(&self) -> &[TankDefinition] {
        &self.tanks
    }

    fn terrain(&self) -> Option<&TerrainDefinition> {
        self.terrain.as_ref()
    }
}

/// Kill/death bookkeeping
pub trait StatsStore: Send + Sync {
    fn record_kill(&self, session: SessionId);
    fn record_death(&self, session: SessionId);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub kills: u32,
    pub deaths: u32,
}

/// Shared in-memory stats; clones see the same counters
#[derive(Debug, Clone, Default)]
pub struct InMemoryStats {
    records: Arc<Mutex<HashMap<SessionId, PlayerRecord>>>,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session: SessionId) -> PlayerRecord {
        self.records.lock().get(&session).copied().unwrap_or_default()
    }

    pub fn kills(&self, session: SessionId) -> u32 {
        self.record(session).kills
    }

    pub fn deaths(&self, session: SessionId) -> u32 {
        self.record(session).deaths
    }
}

impl StatsStore for InMemoryStats {
    fn record_kill(&self, session: SessionId) {
        self.records.lock().entry(session).or_default().kills += 1;
    }

    fn record_death(&self, session: SessionId) {
        self.records.lock().entry(session).or_default().deaths += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const TEST_CATALOG: &str = r#"{
        "ammo": [
            { "name": "AP", "penetration": 150, "damage": 200, "muzzleVelocity": 800 }
        ],
        "tanks": [
            { "name": "T-1", "class": "tankDestroyer", "armor": 90, "turretXPercent": 30 }
        ],
        "terrain": { "name": "hills", "size": 100, "resolution": 2, "heights": [0, 1, 2, 3] }
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = StaticCatalog::from_json_str(TEST_CATALOG).unwrap();
        let ammo = catalog.find_ammo("AP").unwrap();
        assert_eq!(ammo.explosion_damage, 0.0);
        assert_eq!(ammo.muzzle_velocity, 800.0);

        let def = catalog.tank("T-1").unwrap();
        assert_eq!(def.class, TankClass::TankDestroyer);
        assert_eq!(def.stats.armor, 90.0);
        assert_eq!(def.stats.turret_x_percent, 30.0);
        assert_eq!(def.stats.max_speed, tank::MAX_SPEED);

        assert_eq!(catalog.terrain().map(|t| t.resolution), Some(2));
    }

    #[test]
    fn test_tank_destroyer_traverse() {
        let catalog = StaticCatalog::from_json_str(TEST_CATALOG).unwrap();
        let stats = catalog.tank("T-1").unwrap().effective_stats();
        assert_eq!(stats.turret_traverse_limit, Some(tank::TANK_DESTROYER_TRAVERSE));

        let medium = TankDefinition::new("M", TankClass::Medium, TankStats::default());
        assert_eq!(medium.effective_stats().turret_traverse_limit, None);
    }

    #[test]
    fn test_duplicate_ammo_rejected() {
        let json = r#"{ "ammo": [
            { "name": "AP", "penetration": 1, "damage": 1, "muzzleVelocity": 1 },
            { "name": "AP", "penetration": 1, "damage": 1, "muzzleVelocity": 1 }
        ] }"#;
        assert!(matches!(
            StaticCatalog::from_json_str(json),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_muzzle_velocity_rejected() {
        let json = r#"{ "ammo": [{ "name": "AP", "penetration": 1, "damage": 1, "muzzleVelocity": 0 }] }"#;
        assert!(StaticCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            StaticCatalog::from_json_str("{ not json"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StaticCatalog::load("/definitely/not/here.json"),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_builtin_is_valid() {
        let catalog = StaticCatalog::builtin();
        assert!(catalog.validate().is_ok());
        assert!(catalog.terrain().is_none());
        assert!(catalog.tank("Destroyer").is_some());
    }

    #[test]
    fn test_in_memory_stats_shared() {
        let stats = InMemoryStats::new();
        let handle = stats.clone();
        let session = Uuid::new_v4();

        handle.record_kill(session);
        handle.record_kill(session);
        handle.record_death(session);

        assert_eq!(stats.kills(session), 2);
        assert_eq!(stats.deaths(session), 1);
        assert_eq!(stats.kills(Uuid::new_v4()), 0);
    }
}
