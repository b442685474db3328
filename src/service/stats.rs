//! Statistics service
//!
//! Per-user tallies, guild leaderboards and quest analytics.
//! Tallies count lifecycle events; analytics are derived from progress rows.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::data::{
    CategoryStats, Database, GuildAnalytics, GuildTotals, QuestAnalytics, QuestCategory,
    QuestOutcomes, StatCounter, UserStats,
};
use crate::error::AppError;

/// Entries kept in each "top" list of the guild overview
const TOP_ENTRIES: usize = 5;

fn percentage(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

impl From<&QuestOutcomes> for QuestAnalytics {
    fn from(outcomes: &QuestOutcomes) -> Self {
        Self {
            quest_id: outcomes.quest.quest_id.clone(),
            title: outcomes.quest.title.clone(),
            category: outcomes.quest.category,
            rank: outcomes.quest.rank,
            total_accepts: outcomes.accepts,
            total_completions: outcomes.approvals,
            total_rejections: outcomes.rejections,
            success_rate: percentage(outcomes.approvals, outcomes.accepts),
            popularity_score: outcomes.accepts as f64 + 2.0 * outcomes.approvals as f64,
        }
    }
}

/// Count occurrences and keep the most frequent, ties in first-seen order
fn top_counts<K: Copy + Eq + Hash>(keys: impl Iterator<Item = K>, limit: usize) -> Vec<(K, i64)> {
    let mut order = Vec::new();
    let mut counts: HashMap<K, i64> = HashMap::new();
    for key in keys {
        let count = counts.entry(key).or_insert_with(|| {
            order.push(key);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<(K, i64)> = order.into_iter().map(|key| (key, counts[&key])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

/// Statistics service
pub struct StatsService {
    db: Arc<Database>,
}

impl StatsService {
    /// Create new stats service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Tallies
    // =========================================================================

    /// Stats of a user in a guild, created as zeros on first access
    pub async fn get_user_stats(&self, user_id: i64, guild_id: i64) -> Result<UserStats, AppError> {
        self.db
            .get_or_create_user_stats(user_id, guild_id, Utc::now())
            .await
    }

    pub async fn update_quest_accepted(&self, user_id: i64, guild_id: i64) -> Result<(), AppError> {
        self.db
            .increment_user_stat(user_id, guild_id, StatCounter::Accepted, Utc::now())
            .await
    }

    pub async fn update_quest_completed(&self, user_id: i64, guild_id: i64) -> Result<(), AppError> {
        self.db
            .increment_user_stat(user_id, guild_id, StatCounter::Completed, Utc::now())
            .await
    }

    pub async fn update_quest_rejected(&self, user_id: i64, guild_id: i64) -> Result<(), AppError> {
        self.db
            .increment_user_stat(user_id, guild_id, StatCounter::Rejected, Utc::now())
            .await
    }

    /// Top users by approved quests, ties broken by ascending user ID
    pub async fn get_guild_leaderboard(
        &self,
        guild_id: i64,
        limit: i64,
    ) -> Result<Vec<UserStats>, AppError> {
        self.db
            .get_guild_leaderboard(guild_id, limit.max(0))
            .await
    }

    pub async fn get_total_guild_stats(&self, guild_id: i64) -> Result<GuildTotals, AppError> {
        self.db.get_guild_totals(guild_id).await
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    pub async fn get_quest_analytics(&self, quest_id: &str) -> Result<QuestAnalytics, AppError> {
        let outcomes = self
            .db
            .get_quest_outcomes(quest_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(QuestAnalytics::from(&outcomes))
    }

    /// Quests ranked by popularity score
    pub async fn get_popular_quests(
        &self,
        guild_id: i64,
        limit: usize,
    ) -> Result<Vec<QuestAnalytics>, AppError> {
        let mut analytics: Vec<QuestAnalytics> = self
            .db
            .get_guild_outcomes(guild_id, None)
            .await?
            .iter()
            .map(QuestAnalytics::from)
            .collect();

        analytics.sort_by(|a, b| b.popularity_score.total_cmp(&a.popularity_score));
        analytics.truncate(limit);
        Ok(analytics)
    }

    /// Outcome totals per category, most quests first
    pub async fn get_category_stats(&self, guild_id: i64) -> Result<Vec<CategoryStats>, AppError> {
        let outcomes = self.db.get_guild_outcomes(guild_id, None).await?;

        let mut by_category: Vec<CategoryStats> = Vec::new();
        for outcome in &outcomes {
            let category = outcome.quest.category;
            let index = match by_category.iter().position(|stats| stats.category == category) {
                Some(index) => index,
                None => {
                    by_category.push(CategoryStats {
                        category,
                        total_quests: 0,
                        total_accepts: 0,
                        total_completions: 0,
                        average_success_rate: 0.0,
                    });
                    by_category.len() - 1
                }
            };
            let stats = &mut by_category[index];
            stats.total_quests += 1;
            stats.total_accepts += outcome.accepts;
            stats.total_completions += outcome.approvals;
        }

        for stats in &mut by_category {
            stats.average_success_rate = percentage(stats.total_completions, stats.total_accepts);
        }
        by_category.sort_by(|a, b| b.total_quests.cmp(&a.total_quests));
        Ok(by_category)
    }

    pub async fn get_trending_quests(
        &self,
        guild_id: i64,
        days: i64,
        limit: usize,
    ) -> Result<Vec<QuestAnalytics>, AppError> {
        self.get_trending_quests_at(guild_id, days, limit, Utc::now())
            .await
    }

    /// Quests with the most acceptances inside the last `days` days
    ///
    /// The reported analytics cover the whole history of each quest.
    pub async fn get_trending_quests_at(
        &self,
        guild_id: i64,
        days: i64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuestAnalytics>, AppError> {
        let since = Duration::try_days(days.max(0))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                AppError::Validation(format!("Trending window of {days} days is out of range"))
            })?;
        let mut recent = self.db.get_guild_outcomes(guild_id, Some(since)).await?;
        recent.sort_by(|a, b| b.accepts.cmp(&a.accepts));
        recent.truncate(limit);

        let mut trending = Vec::with_capacity(recent.len());
        for outcome in recent {
            trending.push(self.get_quest_analytics(&outcome.quest.quest_id).await?);
        }
        Ok(trending)
    }

    /// Guild overview: totals, success rate over decided attempts, and the
    /// most common categories, ranks and creators
    pub async fn get_guild_analytics(&self, guild_id: i64) -> Result<GuildAnalytics, AppError> {
        let outcomes = self.db.get_guild_outcomes(guild_id, None).await?;
        let active_users = self.db.count_guild_participants(guild_id).await?;

        let completed_quests: i64 = outcomes.iter().map(|outcome| outcome.approvals).sum();
        let decided: i64 = outcomes
            .iter()
            .map(|outcome| outcome.approvals + outcome.rejections)
            .sum();

        let popular_categories: Vec<(QuestCategory, i64)> = top_counts(
            outcomes.iter().map(|outcome| outcome.quest.category),
            TOP_ENTRIES,
        );

        Ok(GuildAnalytics {
            total_quests: outcomes.len() as i64,
            completed_quests,
            active_users,
            success_rate: percentage(completed_quests, decided),
            popular_categories,
            popular_ranks: top_counts(outcomes.iter().map(|outcome| outcome.quest.rank), TOP_ENTRIES),
            top_creators: top_counts(
                outcomes.iter().map(|outcome| outcome.quest.creator_id),
                TOP_ENTRIES,
            ),
        })
    }
}
