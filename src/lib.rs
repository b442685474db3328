//! Questboard - quest lifecycle service for community guilds
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Actor headers from the chat front end                    │
//! │  - Permission policy gate                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Quest lifecycle state machine                            │
//! │  - Stats, analytics, bookmarks, search, teams               │
//! │  - Deadline and recurring quest scheduler                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer and domain models
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use service::{
    BookmarkService, ChannelService, GuildRolePolicy, PermissionPolicy, QuestScheduler,
    QuestService, SearchService, StatsService, TeamService, TracingNotifier,
};

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and services.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Capability checks for privileged operations
    pub policy: Arc<dyn PermissionPolicy>,

    pub quests: Arc<QuestService>,
    pub stats: Arc<StatsService>,
    pub bookmarks: Arc<BookmarkService>,
    pub search: Arc<SearchService>,
    pub teams: Arc<TeamService>,
    pub channels: Arc<ChannelService>,

    /// Deadline monitor, shared with the background task
    pub scheduler: Arc<QuestScheduler>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the permission policy from configuration
    /// 3. Wire services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect_with(
            &config.database.path,
            &data::PoolSettings::from(&config.database),
        )
        .await?;
        tracing::info!("Database connected");

        let policy = Arc::new(GuildRolePolicy::new(&config.permissions));

        let state = Self::with_parts(config, Arc::new(db), policy);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Assemble state from an open database and a policy
    pub fn with_parts(
        config: config::AppConfig,
        db: Arc<data::Database>,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Self {
        let scheduler = QuestScheduler::new(db.clone(), Arc::new(TracingNotifier), &config.scheduler);

        Self {
            quests: Arc::new(QuestService::new(db.clone(), &config.lifecycle)),
            stats: Arc::new(StatsService::new(db.clone())),
            bookmarks: Arc::new(BookmarkService::new(db.clone())),
            search: Arc::new(SearchService::new(db.clone())),
            teams: Arc::new(TeamService::new(db.clone())),
            channels: Arc::new(ChannelService::new(db.clone())),
            scheduler: Arc::new(scheduler),
            config: Arc::new(config),
            db,
            policy,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "questboard",
    }))
}
