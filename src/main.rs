//! Questboard binary entry point

use std::sync::Arc;

use questboard::{AppState, config, service::QuestScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the logging section
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (deadline and recurring quest scheduler)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides logging.level
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.logging.default_filter().into())
    };

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Questboard...");
    tracing::info!(
        database = %config.database.path.display(),
        cooldown_hours = config.lifecycle.cooldown_hours,
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    // 3. Initialize metrics
    questboard::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = questboard::build_router(state.clone());

    // 6. Start background tasks
    if config.scheduler.enabled {
        spawn_scheduler_task(
            state.scheduler.clone(),
            config.scheduler.interval_seconds,
        );
    }

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background deadline and recurring quest checks
fn spawn_scheduler_task(scheduler: Arc<QuestScheduler>, interval_seconds: u64) {
    let period = std::time::Duration::from_secs(interval_seconds.max(1));
    tokio::spawn(scheduler.run(period));

    tracing::info!(interval_seconds, "Scheduler task spawned");
}
