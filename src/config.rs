use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use thiserror::Error;

use crate::game::constants::{net, physics, projectile};

/// Simulation server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Fixed simulation rate in Hz
    pub tick_rate: u32,
    /// Gravitational acceleration along y (m/s², negative is down)
    pub gravity: f64,
    /// Projectile lifetime before timing out (ms)
    pub projectile_lifetime_ms: f64,
    /// Maximum intents queued between two ticks
    pub intent_buffer_capacity: usize,
    /// Destroy tanks at the end of the tick in which they die
    pub remove_on_death: bool,
    /// JSON catalog of tanks/ammo/terrain; built-in set when absent
    pub catalog_path: Option<String>,
    /// Address for the metrics endpoint
    pub metrics_bind_address: IpAddr,
    /// Port for the metrics endpoint (0 disables it)
    pub metrics_port: u16,
    /// Encode a snapshot every N ticks
    pub snapshot_interval_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: physics::TICK_RATE,
            gravity: physics::GRAVITY,
            projectile_lifetime_ms: projectile::DEFAULT_LIFETIME_MS,
            intent_buffer_capacity: net::INTENT_BUFFER_CAPACITY,
            remove_on_death: false,
            catalog_path: None,
            metrics_bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            metrics_port: 9090,
            snapshot_interval_ticks: net::SNAPSHOT_INTERVAL_TICKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("tick_rate must be 1-1000, got {0}")]
    TickRate(u32),
    #[error("gravity must be finite and not upward, got {0}")]
    Gravity(f64),
    #[error("projectile_lifetime_ms must be positive, got {0}")]
    ProjectileLifetime(f64),
    #[error("intent_buffer_capacity must be at least 1")]
    IntentBufferCapacity,
    #[error("snapshot_interval_ticks must be at least 1")]
    SnapshotInterval,
}

/// Read `key` and parse it, warning and returning `None` on bad input
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(rate) = env_parse::<u32>("TICK_RATE") {
            if (1..=1000).contains(&rate) {
                config.tick_rate = rate;
            } else {
                tracing::warn!("TICK_RATE must be 1-1000, using default");
            }
        }

        if let Some(gravity) = env_parse::<f64>("GRAVITY") {
            if gravity.is_finite() && gravity <= 0.0 {
                config.gravity = gravity;
            } else {
                tracing::warn!("GRAVITY must be finite and <= 0, using default");
            }
        }

        if let Some(lifetime) = env_parse::<f64>("PROJECTILE_LIFETIME_MS") {
            if lifetime.is_finite() && lifetime > 0.0 {
                config.projectile_lifetime_ms = lifetime;
            } else {
                tracing::warn!("PROJECTILE_LIFETIME_MS must be > 0, using default");
            }
        }

        if let Some(capacity) = env_parse::<usize>("INTENT_BUFFER_CAPACITY") {
            if capacity > 0 {
                config.intent_buffer_capacity = capacity;
            } else {
                tracing::warn!("INTENT_BUFFER_CAPACITY must be > 0, using default");
            }
        }

        if let Some(remove) = env_parse::<bool>("REMOVE_ON_DEATH") {
            config.remove_on_death = remove;
        }

        if let Ok(path) = std::env::var("CATALOG_PATH") {
            if !path.trim().is_empty() {
                config.catalog_path = Some(path);
            }
        }

        if let Some(addr) = env_parse::<IpAddr>("METRICS_BIND_ADDRESS") {
            config.metrics_bind_address = addr;
        }

        if let Some(port) = env_parse::<u16>("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Some(interval) = env_parse::<u32>("SNAPSHOT_INTERVAL_TICKS") {
            if interval > 0 {
                config.snapshot_interval_ticks = interval;
            } else {
                tracing::warn!("SNAPSHOT_INTERVAL_TICKS must be > 0, using default");
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.tick_rate) {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        if !(self.gravity.is_finite() && self.gravity <= 0.0) {
            return Err(ConfigError::Gravity(self.gravity));
        }
        if !(self.projectile_lifetime_ms.is_finite() && self.projectile_lifetime_ms > 0.0) {
            return Err(ConfigError::ProjectileLifetime(self.projectile_lifetime_ms));
        }
        if self.intent_buffer_capacity == 0 {
            return Err(ConfigError::IntentBufferCapacity);
        }
        if self.snapshot_interval_ticks == 0 {
            return Err(ConfigError::SnapshotInterval);
        }
        Ok(())
    }

    /// Seconds per tick
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate as f64
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }
}
