//! Prometheus-compatible metrics endpoint
//!
//! Exposes simulation counters in Prometheus text format, plus a JSON view.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::events::{ProjectileOutcome, SimEvent, TickReport};

const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the simulation server
#[derive(Debug)]
pub struct Metrics {
    // Entity counts
    pub tank_count: AtomicU64,
    pub projectile_count: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,
    /// Tick time as a share of the tick budget, in percent
    pub budget_usage_percent: AtomicU64,

    // Combat totals
    pub shots_fired: AtomicU64,
    pub tank_hits: AtomicU64,
    pub terrain_hits: AtomicU64,
    pub projectiles_expired: AtomicU64,
    pub tanks_destroyed: AtomicU64,

    // Snapshot output
    pub snapshots_encoded: AtomicU64,
    pub snapshot_bytes: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tank_count: AtomicU64::new(0),
            projectile_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            budget_usage_percent: AtomicU64::new(0),
            shots_fired: AtomicU64::new(0),
            tank_hits: AtomicU64::new(0),
            terrain_hits: AtomicU64::new(0),
            projectiles_expired: AtomicU64::new(0),
            tanks_destroyed: AtomicU64::new(0),
            snapshots_encoded: AtomicU64::new(0),
            snapshot_bytes: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time against the tick budget and update percentiles
    pub fn record_tick_time(&self, duration: Duration, budget: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let budget_us = budget.as_micros() as u64;
        if budget_us > 0 {
            self.budget_usage_percent
                .store(us * 100 / budget_us, Ordering::Relaxed);
        }

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Fold one tick's events into the combat totals
    pub fn record_report(&self, report: &TickReport) {
        for event in &report.events {
            match event {
                SimEvent::ProjectileFired { .. } => {
                    self.shots_fired.fetch_add(1, Ordering::Relaxed);
                }
                SimEvent::TankDestroyed { .. } => {
                    self.tanks_destroyed.fetch_add(1, Ordering::Relaxed);
                }
                SimEvent::ProjectileResolved { outcome, .. } => {
                    let counter = match outcome {
                        ProjectileOutcome::Tank { .. } => &self.tank_hits,
                        ProjectileOutcome::Terrain => &self.terrain_hits,
                        ProjectileOutcome::Timeout | ProjectileOutcome::OutOfBounds => {
                            &self.projectiles_expired
                        }
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                SimEvent::Damage { .. } | SimEvent::Explosion { .. } => {}
            }
        }
    }

    pub fn record_snapshot(&self, bytes: usize) {
        self.snapshots_encoded.fetch_add(1, Ordering::Relaxed);
        self.snapshot_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn set_population(&self, tanks: usize, projectiles: usize) {
        self.tank_count.store(tanks as u64, Ordering::Relaxed);
        self.projectile_count.store(projectiles as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("tank_arena_tanks", "Tanks in the arena", "gauge",
            self.tank_count.load(Ordering::Relaxed));
        metric!("tank_arena_projectiles", "Projectiles in flight", "gauge",
            self.projectile_count.load(Ordering::Relaxed));

        metric!("tank_arena_tick_time_us", "Last tick duration in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("tank_arena_tick_time_p95_us", "95th percentile tick duration", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("tank_arena_tick_time_p99_us", "99th percentile tick duration", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("tank_arena_tick_time_max_us", "Maximum tick duration in the window", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("tank_arena_ticks_total", "Simulation ticks run", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("tank_arena_budget_usage_percent", "Tick time as percent of budget", "gauge",
            self.budget_usage_percent.load(Ordering::Relaxed));

        metric!("tank_arena_shots_fired_total", "Projectiles fired", "counter",
            self.shots_fired.load(Ordering::Relaxed));
        metric!("tank_arena_tank_hits_total", "Projectiles resolved against a tank", "counter",
            self.tank_hits.load(Ordering::Relaxed));
        metric!("tank_arena_terrain_hits_total", "Projectiles resolved against terrain", "counter",
            self.terrain_hits.load(Ordering::Relaxed));
        metric!("tank_arena_projectiles_expired_total", "Projectiles timed out or out of bounds", "counter",
            self.projectiles_expired.load(Ordering::Relaxed));
        metric!("tank_arena_tanks_destroyed_total", "Tanks destroyed", "counter",
            self.tanks_destroyed.load(Ordering::Relaxed));

        metric!("tank_arena_snapshots_total", "Snapshots encoded", "counter",
            self.snapshots_encoded.load(Ordering::Relaxed));
        metric!("tank_arena_snapshot_bytes_total", "Encoded snapshot bytes", "counter",
            self.snapshot_bytes.load(Ordering::Relaxed));

        metric!("tank_arena_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "entities": {
                "tanks": self.tank_count.load(Ordering::Relaxed),
                "projectiles": self.projectile_count.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
                "budget_percent": self.budget_usage_percent.load(Ordering::Relaxed),
            },
            "combat": {
                "shots_fired": self.shots_fired.load(Ordering::Relaxed),
                "tank_hits": self.tank_hits.load(Ordering::Relaxed),
                "terrain_hits": self.terrain_hits.load(Ordering::Relaxed),
                "expired": self.projectiles_expired.load(Ordering::Relaxed),
                "tanks_destroyed": self.tanks_destroyed.load(Ordering::Relaxed),
            },
            "snapshots": {
                "count": self.snapshots_encoded.load(Ordering::Relaxed),
                "bytes": self.snapshot_bytes.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /metrics/json") {
                        http_response("application/json", &metrics.to_json())
                    } else if request.starts_with("GET /metrics") {
                        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
                    } else if request.starts_with("GET /health") {
                        http_response("text/plain", "OK")
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
