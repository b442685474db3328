//! Leaderboard and analytics endpoints

use axum::{
    extract::{Query, State},
    response::Json,
};

use super::actor::CurrentActor;
use super::dto::{LimitParams, TrendingParams};
use crate::AppState;
use crate::data::{CategoryStats, GuildAnalytics, GuildTotals, QuestAnalytics, UserStats};
use crate::error::AppError;

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const DEFAULT_ANALYTICS_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_TRENDING_DAYS: i64 = 7;

fn page_size(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).min(MAX_PAGE_SIZE)
}

/// GET /api/v1/leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<UserStats>>, AppError> {
    let limit = page_size(params.limit, DEFAULT_LEADERBOARD_SIZE) as i64;
    Ok(Json(
        state
            .stats
            .get_guild_leaderboard(actor.guild_id, limit)
            .await?,
    ))
}

/// GET /api/v1/stats
pub async fn guild_totals(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<GuildTotals>, AppError> {
    Ok(Json(state.stats.get_total_guild_stats(actor.guild_id).await?))
}

/// GET /api/v1/analytics
pub async fn guild_analytics(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<GuildAnalytics>, AppError> {
    Ok(Json(state.stats.get_guild_analytics(actor.guild_id).await?))
}

/// GET /api/v1/analytics/popular
pub async fn popular_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<QuestAnalytics>>, AppError> {
    let limit = page_size(params.limit, DEFAULT_ANALYTICS_SIZE);
    Ok(Json(
        state
            .stats
            .get_popular_quests(actor.guild_id, limit)
            .await?,
    ))
}

/// GET /api/v1/analytics/categories
pub async fn category_stats(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<CategoryStats>>, AppError> {
    Ok(Json(state.stats.get_category_stats(actor.guild_id).await?))
}

/// GET /api/v1/analytics/trending
pub async fn trending_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<QuestAnalytics>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_TRENDING_DAYS);
    let limit = page_size(params.limit, DEFAULT_ANALYTICS_SIZE);
    Ok(Json(
        state
            .stats
            .get_trending_quests(actor.guild_id, days, limit)
            .await?,
    ))
}
