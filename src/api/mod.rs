//! API layer
//!
//! HTTP handlers for:
//! - Quest creation and the member lifecycle
//! - Stats, leaderboard and analytics
//! - Bookmarks, search, templates and teams
//! - Deadlines, recurring quests and channel routing
//! - Metrics (Prometheus)
//!
//! Every `/api/v1` route acts on behalf of the member named in the actor
//! headers and only sees quests of that member's guild.

mod actor;
mod bookmarks;
mod channels;
mod dto;
pub mod metrics;
mod quests;
mod schedules;
mod stats;
mod teams;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use actor::{
    CurrentActor, GUILD_ID_HEADER, GUILD_PERMISSIONS_HEADER, ROLE_IDS_HEADER, ROLE_NAMES_HEADER,
    USER_ID_HEADER, actor_from_headers,
};
pub use dto::*;
pub use metrics::metrics_router;

/// Create the `/api/v1` router
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Quests
        .route(
            "/quests",
            get(quests::list_quests).post(quests::create_quest),
        )
        .route(
            "/quests/from_template",
            post(quests::create_quest_from_template),
        )
        .route("/quests/available", get(quests::available_quests))
        .route(
            "/quests/:id",
            get(quests::get_quest).delete(quests::delete_quest),
        )
        .route("/quests/:id/accept", post(quests::accept_quest))
        .route("/quests/:id/submit", post(quests::submit_proof))
        .route(
            "/quests/:id/approve/:user_id",
            post(quests::approve_submission),
        )
        .route(
            "/quests/:id/reject/:user_id",
            post(quests::reject_submission),
        )
        .route("/quests/:id/analytics", get(quests::quest_analytics))
        // Personal views
        .route("/me/quests", get(quests::my_quests))
        .route("/me/stats", get(quests::my_stats))
        .route("/me/approvals", get(quests::my_pending_approvals))
        // Catalog and discovery
        .route("/templates", get(quests::list_templates))
        .route("/search", get(quests::search_quests))
        // Stats and analytics
        .route("/leaderboard", get(stats::leaderboard))
        .route("/stats", get(stats::guild_totals))
        .route("/analytics", get(stats::guild_analytics))
        .route("/analytics/popular", get(stats::popular_quests))
        .route("/analytics/categories", get(stats::category_stats))
        .route("/analytics/trending", get(stats::trending_quests))
        // Bookmarks
        .route("/bookmarks", get(bookmarks::get_bookmarks))
        .route(
            "/quests/:id/bookmark",
            post(bookmarks::bookmark_quest).delete(bookmarks::unbookmark_quest),
        )
        // Teams
        .route(
            "/quests/:id/team",
            get(teams::get_team).post(teams::create_team),
        )
        .route("/quests/:id/team/join", post(teams::join_team))
        // Scheduling
        .route(
            "/quests/:id/deadline",
            get(schedules::get_deadline)
                .put(schedules::set_deadline)
                .delete(schedules::clear_deadline),
        )
        .route(
            "/recurring",
            get(schedules::list_recurring).post(schedules::create_recurring),
        )
        .route(
            "/recurring/:id",
            axum::routing::delete(schedules::deactivate_recurring),
        )
        // Channel routing
        .route(
            "/channels",
            get(channels::get_channels).put(channels::set_channels),
        )
}
