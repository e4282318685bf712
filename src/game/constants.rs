/// Physics constants
pub mod physics {
    /// Gravitational acceleration along y (m/s²)
    pub const GRAVITY: f64 = -9.82;
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f64 = 1.0 / 60.0;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Projectiles that fall below this height are removed as out-of-bounds
    pub const OUT_OF_BOUNDS_Y: f64 = -50.0;
    /// Tank hull centres are never allowed below ground height + this value
    pub const TANK_HEIGHT_FLOOR: f64 = 0.1;
    /// Hull density used to derive tank mass from its box volume (kg/m³)
    pub const TANK_DENSITY: f64 = 450.0;
    /// Lower bound on derived tank mass (kg)
    pub const TANK_MIN_MASS: f64 = 5_000.0;
    /// Linear damping applied as `v *= (1 - damping)^dt`
    pub const TANK_LINEAR_DAMPING: f64 = 0.3;
    /// Angular damping for hull yaw rate
    pub const TANK_ANGULAR_DAMPING: f64 = 0.9;
    /// Projectile damping (air drag approximation)
    pub const PROJECTILE_LINEAR_DAMPING: f64 = 0.01;
}

/// Projectile body defaults
pub mod projectile {
    /// Default collision sphere radius (m)
    pub const DEFAULT_RADIUS: f64 = 0.25;
    /// Default mass (kg)
    pub const DEFAULT_MASS: f64 = 2.0;
    /// Default lifetime before a projectile times out (ms)
    pub const DEFAULT_LIFETIME_MS: f64 = 5000.0;
}

/// Muzzle placement constants
pub mod muzzle {
    /// Minimum height of a spawned shell above the hull's bottom face (m)
    pub const MUZZLE_TERRAIN_CLEARANCE: f64 = 0.2;
    /// Turret mount percentage used when a tank does not specify one
    pub const DEFAULT_MOUNT_PERCENT: f64 = 50.0;
}

/// Damage resolution constants
pub mod damage {
    /// Fraction of flat damage applied when a shell fails to penetrate
    pub const NON_PENETRATION_FACTOR: f64 = 0.5;
}

/// Canonical tank stats used when a definition carries malformed values
pub mod tank {
    pub const MAX_HEALTH: f64 = 1000.0;
    pub const MAX_SPEED: f64 = 12.0;
    pub const MAX_REVERSE_SPEED: f64 = 5.0;
    /// Turret traverse rate (rad/s)
    pub const TURRET_ROTATION_RATE: f64 = 0.7;
    /// Hull turn rate (rad/s)
    pub const HULL_ROTATION_RATE: f64 = 0.8;
    /// Gun elevation limit (rad, ~20°)
    pub const GUN_ELEVATION: f64 = 0.35;
    /// Gun depression limit (rad, ~8°)
    pub const GUN_DEPRESSION: f64 = 0.14;
    /// Default horizontal traverse for casemate tank destroyers (rad, ~12°)
    pub const TANK_DESTROYER_TRAVERSE: f64 = 0.21;
    pub const BARREL_LENGTH: f64 = 4.0;
    pub const BODY_WIDTH: f64 = 3.4;
    pub const BODY_HEIGHT: f64 = 1.6;
    pub const BODY_LENGTH: f64 = 6.5;
    pub const TURRET_WIDTH: f64 = 2.4;
    pub const TURRET_HEIGHT: f64 = 0.9;
    pub const TURRET_LENGTH: f64 = 2.8;
    pub const ARMOR: f64 = 100.0;
    pub const ROUNDS_PER_MINUTE: f64 = 8.0;
}

/// Contact material coefficients
pub mod material {
    pub const TANK_GROUND_FRICTION: f64 = 0.6;
    pub const TANK_GROUND_RESTITUTION: f64 = 0.0;
    pub const PROJECTILE_GROUND_FRICTION: f64 = 0.3;
    pub const PROJECTILE_GROUND_RESTITUTION: f64 = 0.1;
    pub const PROJECTILE_TANK_FRICTION: f64 = 0.0;
    pub const PROJECTILE_TANK_RESTITUTION: f64 = 0.0;
}

/// Collision detection tuning
pub mod collision {
    /// Broad-phase grid cell size on the x/z plane (m)
    /// Should be larger than the longest tank hull
    pub const GRID_CELL_SIZE: f64 = 16.0;
    /// Sample spacing when marching a projectile segment against the heightfield (m)
    pub const TERRAIN_MARCH_STEP: f64 = 0.5;
}

/// Spawn constants
pub mod spawn {
    /// Minimum spawn distance from the arena centre
    pub const ZONE_MIN: f64 = 20.0;
    /// Maximum spawn distance from the arena centre
    pub const ZONE_MAX: f64 = 120.0;
}

/// Network constants
pub mod net {
    /// Send a snapshot every N ticks
    pub const SNAPSHOT_INTERVAL_TICKS: u32 = 3;
    /// Intent buffer capacity (fire + move intents between two ticks)
    pub const INTENT_BUFFER_CAPACITY: usize = 1024;
}

/// Reload time in seconds for a cannon firing `rounds_per_minute`
#[inline]
pub fn reload_seconds(rounds_per_minute: f64) -> f64 {
    if rounds_per_minute > 0.0 && rounds_per_minute.is_finite() {
        60.0 / rounds_per_minute
    } else {
        60.0 / tank::ROUNDS_PER_MINUTE
    }
}
