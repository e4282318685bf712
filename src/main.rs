use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tank_arena_server::catalog::{Catalog, InMemoryStats, StaticCatalog};
use tank_arena_server::config::SimConfig;
use tank_arena_server::game::events::SimEvent;
use tank_arena_server::game::{ControllerConfig, SimulationController};
use tank_arena_server::metrics::{self, Metrics};
use tank_arena_server::net::protocol::{self, ServerMessage};

fn load_catalog(config: &SimConfig) -> anyhow::Result<Arc<dyn Catalog>> {
    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = StaticCatalog::load(path)?;
            info!("Catalog loaded from {}", path);
            catalog
        }
        None => StaticCatalog::builtin(),
    };
    info!(
        "Catalog: {} tanks, {} ammo types, terrain '{}'",
        catalog.tanks().len(),
        catalog.ammo().len(),
        catalog.terrain().map_or("flat", |terrain| terrain.name.as_str())
    );
    Ok(Arc::new(catalog))
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::ProjectileFired { shooter, ammo, .. } => {
            debug!("{} fired {}", shooter, ammo);
        }
        SimEvent::Damage {
            shooter_session,
            target_session,
            damage,
            remaining_health,
            ..
        } => {
            info!(
                "{} hit {} for {:.1} ({:.1} left)",
                shooter_session, target_session, damage, remaining_health
            );
        }
        SimEvent::Explosion { position, radius, .. } => {
            debug!("Explosion r={:.1} at {:?}", radius, position);
        }
        SimEvent::TankDestroyed { session, killer } => {
            info!("{} destroyed by {}", session, killer);
        }
        SimEvent::ProjectileResolved {
            projectile_id,
            outcome,
            ..
        } => {
            debug!("Projectile {} resolved: {}", projectile_id, outcome.as_str());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Tank Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: tick_rate={}Hz, gravity={}, snapshot every {} ticks",
        config.tick_rate, config.gravity, config.snapshot_interval_ticks
    );

    let catalog = load_catalog(&config)?;
    let stats = Arc::new(InMemoryStats::new());
    let mut controller = SimulationController::new(ControllerConfig::from(&config), catalog, stats);

    let metrics = Arc::new(Metrics::new());
    if config.metrics_enabled() {
        let addr = SocketAddr::new(config.metrics_bind_address, config.metrics_port);
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, addr).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let dt = config.dt();
    let budget = Duration::from_secs_f64(dt);
    let mut interval = tokio::time::interval(budget);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Simulation running at {}Hz", config.tick_rate);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let started = Instant::now();
                let report = controller.tick(dt);
                for event in &report.events {
                    log_event(event);
                }
                metrics.record_report(&report);

                if report.tick % config.snapshot_interval_ticks as u64 == 0 {
                    match protocol::encode(&ServerMessage::Snapshot(controller.snapshot())) {
                        Ok(bytes) => metrics.record_snapshot(bytes.len()),
                        Err(e) => warn!("Snapshot encode failed: {}", e),
                    }
                }

                metrics.set_population(controller.player_count(), controller.projectile_count());
                let elapsed = started.elapsed();
                metrics.record_tick_time(elapsed, budget);
                if elapsed > budget {
                    warn!("Tick {} overran budget: {:?}", report.tick, elapsed);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Server stopped after {} ticks", controller.tick_count());
    Ok(())
}
