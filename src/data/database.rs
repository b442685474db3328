//! SQLite database operations
//!
//! All database access goes through this module.
//! Every lifecycle mutation is a single conditional statement, or a short
//! transaction when a transition and its side effects must land together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::time::{Duration, Instant};

use super::models::*;
use crate::error::AppError;

/// Connection pool limits
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Bounded wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Bounded wait on a locked database file
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::DatabaseConfig> for PoolSettings {
    fn from(config: &crate::config::DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            acquire_timeout: config.acquire_timeout(),
            busy_timeout: config.busy_timeout(),
        }
    }
}

/// Observes query latency when dropped
struct QueryTimer {
    operation: &'static str,
    started: Instant,
}

impl QueryTimer {
    fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        crate::metrics::observe_db_query(self.operation, self.started.elapsed());
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database with default pool settings
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with(path, &PoolSettings::default()).await
    }

    /// Connect to SQLite database
    ///
    /// The pool runs in WAL mode with foreign keys enforced.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    /// * `settings` - Pool size and timeouts
    pub async fn connect_with(path: &Path, settings: &PoolSettings) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Storage(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(settings.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Quests
    // =========================================================================

    /// Insert a new quest
    pub async fn insert_quest(&self, quest: &Quest) -> Result<(), AppError> {
        let _timer = QueryTimer::start("insert_quest");
        insert_quest_with(&self.pool, quest).await
    }

    /// Get quest by ID
    pub async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>, AppError> {
        let _timer = QueryTimer::start("get_quest");
        let quest = sqlx::query_as::<_, Quest>("SELECT * FROM quests WHERE quest_id = ?")
            .bind(quest_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quest)
    }

    /// Quests of a guild with status `available`, newest first
    pub async fn get_available_quests(&self, guild_id: i64) -> Result<Vec<Quest>, AppError> {
        let _timer = QueryTimer::start("get_available_quests");
        let quests = sqlx::query_as::<_, Quest>(
            r#"
            SELECT * FROM quests
            WHERE guild_id = ? AND status = 'available'
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quests)
    }

    /// Every quest of a guild, newest first
    pub async fn get_guild_quests(&self, guild_id: i64) -> Result<Vec<Quest>, AppError> {
        let _timer = QueryTimer::start("get_guild_quests");
        let quests = sqlx::query_as::<_, Quest>(
            "SELECT * FROM quests WHERE guild_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quests)
    }

    /// Set the summary status of a quest
    ///
    /// # Returns
    /// `true` if the quest exists
    pub async fn update_quest_status(
        &self,
        quest_id: &str,
        status: QuestStatus,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("update_quest_status");
        let result = sqlx::query("UPDATE quests SET status = ? WHERE quest_id = ?")
            .bind(status)
            .bind(quest_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a quest together with every row that references it
    ///
    /// Progress, bookmarks, the deadline record and team rows go in the
    /// same transaction as the quest itself.
    ///
    /// # Returns
    /// `false` if the quest did not exist
    pub async fn delete_quest(&self, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_quest");
        let mut tx = self.pool.begin().await?;

        for statement in [
            "DELETE FROM team_members WHERE quest_id = ?",
            "DELETE FROM team_quests WHERE quest_id = ?",
            "DELETE FROM quest_deadlines WHERE quest_id = ?",
            "DELETE FROM quest_bookmarks WHERE quest_id = ?",
            "DELETE FROM quest_progress WHERE quest_id = ?",
        ] {
            sqlx::query(statement)
                .bind(quest_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM quests WHERE quest_id = ?")
            .bind(quest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Search quests of a guild
    ///
    /// # Arguments
    /// * `guild_id` - Tenant scope
    /// * `keyword` - Case-insensitive substring of title or description
    /// * `rank` / `category` - Optional equality filters
    /// * `limit` - Maximum rows, already clamped by the caller
    pub async fn search_quests(
        &self,
        guild_id: i64,
        keyword: Option<&str>,
        rank: Option<QuestRank>,
        category: Option<QuestCategory>,
        limit: i64,
    ) -> Result<Vec<Quest>, AppError> {
        let _timer = QueryTimer::start("search_quests");
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM quests WHERE guild_id = ");
        query.push_bind(guild_id);

        if let Some(keyword) = keyword {
            query
                .push(" AND (instr(lower(title), lower(")
                .push_bind(keyword.to_string())
                .push(")) > 0 OR instr(lower(description), lower(")
                .push_bind(keyword.to_string())
                .push(")) > 0)");
        }
        if let Some(rank) = rank {
            query.push(" AND rank = ").push_bind(rank);
        }
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category);
        }

        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit);

        let quests = query
            .build_query_as::<Quest>()
            .fetch_all(&self.pool)
            .await?;

        Ok(quests)
    }

    // =========================================================================
    // Quest progress
    // =========================================================================

    /// Get the progress row of one user on one quest
    pub async fn get_progress(
        &self,
        user_id: i64,
        quest_id: &str,
    ) -> Result<Option<QuestProgress>, AppError> {
        let _timer = QueryTimer::start("get_progress");
        let progress = sqlx::query_as::<_, QuestProgress>(
            "SELECT * FROM quest_progress WHERE user_id = ? AND quest_id = ?",
        )
        .bind(user_id)
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    /// All progress rows of a user in a guild, most recently accepted first
    pub async fn get_user_progress(
        &self,
        user_id: i64,
        guild_id: i64,
    ) -> Result<Vec<QuestProgress>, AppError> {
        let _timer = QueryTimer::start("get_user_progress");
        let progress = sqlx::query_as::<_, QuestProgress>(
            r#"
            SELECT * FROM quest_progress
            WHERE user_id = ? AND guild_id = ?
            ORDER BY accepted_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(progress)
    }

    /// Write a fresh accepted row and count the acceptance
    ///
    /// The write only lands if the stored row still matches `observed`:
    /// absent when `observed` is `None`, otherwise still rejected with the
    /// same `completed_at`. The stat increment shares the transaction.
    ///
    /// # Returns
    /// `false` if a concurrent writer changed the row first
    pub async fn accept_progress(
        &self,
        progress: &QuestProgress,
        observed: Option<&QuestProgress>,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("accept_progress");
        let attachments = encode_json(&progress.proof_attachments)?;
        let mut tx = self.pool.begin().await?;

        let result = match observed {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO quest_progress (
                        quest_id, user_id, guild_id, status, accepted_at, completed_at,
                        reviewed_at, proof_text, proof_attachments, approval_status,
                        accepted_channel_id
                    ) VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?)
                    ON CONFLICT(user_id, quest_id) DO NOTHING
                    "#,
                )
                .bind(&progress.quest_id)
                .bind(progress.user_id)
                .bind(progress.guild_id)
                .bind(progress.status)
                .bind(progress.accepted_at)
                .bind(&progress.proof_text)
                .bind(&attachments)
                .bind(&progress.approval_status)
                .bind(progress.channel_id)
                .execute(&mut *tx)
                .await?
            }
            Some(previous) => {
                sqlx::query(
                    r#"
                    INSERT INTO quest_progress (
                        quest_id, user_id, guild_id, status, accepted_at, completed_at,
                        reviewed_at, proof_text, proof_attachments, approval_status,
                        accepted_channel_id
                    ) VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?)
                    ON CONFLICT(user_id, quest_id) DO UPDATE SET
                        guild_id = excluded.guild_id,
                        status = excluded.status,
                        accepted_at = excluded.accepted_at,
                        completed_at = NULL,
                        reviewed_at = NULL,
                        proof_text = excluded.proof_text,
                        proof_attachments = excluded.proof_attachments,
                        approval_status = excluded.approval_status,
                        accepted_channel_id = excluded.accepted_channel_id
                    WHERE quest_progress.status = 'rejected'
                        AND quest_progress.completed_at IS ?
                    "#,
                )
                .bind(&progress.quest_id)
                .bind(progress.user_id)
                .bind(progress.guild_id)
                .bind(progress.status)
                .bind(progress.accepted_at)
                .bind(&progress.proof_text)
                .bind(&attachments)
                .bind(&progress.approval_status)
                .bind(progress.channel_id)
                .bind(previous.completed_at)
                .execute(&mut *tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        increment_stat_with(
            &mut *tx,
            progress.user_id,
            progress.guild_id,
            StatCounter::Accepted,
            progress.accepted_at,
        )
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Move an accepted row to completed and store the proof
    ///
    /// # Returns
    /// The updated row, or `None` if no accepted row matched
    pub async fn complete_progress(
        &self,
        user_id: i64,
        quest_id: &str,
        proof_text: &str,
        proof_attachments: &[String],
        now: DateTime<Utc>,
    ) -> Result<Option<QuestProgress>, AppError> {
        let _timer = QueryTimer::start("complete_progress");
        let attachments = encode_json(&proof_attachments)?;

        let progress = sqlx::query_as::<_, QuestProgress>(
            r#"
            UPDATE quest_progress
            SET status = 'completed', completed_at = ?, proof_text = ?, proof_attachments = ?
            WHERE user_id = ? AND quest_id = ? AND status = 'accepted'
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(proof_text)
        .bind(&attachments)
        .bind(user_id)
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    /// Record the review decision on a completed row and count it
    ///
    /// `completed_at` is left untouched. The stat increment shares the
    /// transaction.
    ///
    /// # Returns
    /// The updated row, or `None` if no completed row matched
    pub async fn review_progress(
        &self,
        user_id: i64,
        quest_id: &str,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<QuestProgress>, AppError> {
        let _timer = QueryTimer::start("review_progress");
        let (status, counter) = if approved {
            (ProgressStatus::Approved, StatCounter::Completed)
        } else {
            (ProgressStatus::Rejected, StatCounter::Rejected)
        };

        let mut tx = self.pool.begin().await?;

        let progress = sqlx::query_as::<_, QuestProgress>(
            r#"
            UPDATE quest_progress
            SET status = ?, approval_status = ?, reviewed_at = ?
            WHERE user_id = ? AND quest_id = ? AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(status.as_str())
        .bind(now)
        .bind(user_id)
        .bind(quest_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(progress) = progress else {
            tx.rollback().await?;
            return Ok(None);
        };

        increment_stat_with(&mut *tx, progress.user_id, progress.guild_id, counter, now).await?;

        tx.commit().await?;

        Ok(Some(progress))
    }

    /// Completed submissions on quests owned by `creator_id`, oldest first
    pub async fn get_pending_approvals(
        &self,
        creator_id: i64,
        guild_id: i64,
    ) -> Result<Vec<PendingApproval>, AppError> {
        let _timer = QueryTimer::start("get_pending_approvals");
        let pending = sqlx::query_as::<_, PendingApproval>(
            r#"
            SELECT p.quest_id, q.title, p.user_id, p.proof_text, p.proof_attachments, p.completed_at
            FROM quest_progress p
            JOIN quests q ON q.quest_id = p.quest_id
            WHERE q.creator_id = ? AND q.guild_id = ? AND p.status = 'completed'
            ORDER BY p.completed_at ASC, p.id ASC
            "#,
        )
        .bind(creator_id)
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pending)
    }

    // =========================================================================
    // User statistics
    // =========================================================================

    /// Get the stats row of a user, inserting a zero row first if needed
    pub async fn get_or_create_user_stats(
        &self,
        user_id: i64,
        guild_id: i64,
        now: DateTime<Utc>,
    ) -> Result<UserStats, AppError> {
        let _timer = QueryTimer::start("get_or_create_user_stats");
        sqlx::query(
            r#"
            INSERT INTO user_stats (user_id, guild_id, last_updated)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, guild_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(guild_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT user_id, guild_id, quests_completed, quests_accepted, quests_rejected, last_updated
            FROM user_stats
            WHERE user_id = ? AND guild_id = ?
            "#,
        )
        .bind(user_id)
        .bind(guild_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Add one to a stats counter
    pub async fn increment_user_stat(
        &self,
        user_id: i64,
        guild_id: i64,
        counter: StatCounter,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let _timer = QueryTimer::start("increment_user_stat");
        increment_stat_with(&self.pool, user_id, guild_id, counter, now).await
    }

    /// Top users of a guild by approved quests, ties broken by user ID
    pub async fn get_guild_leaderboard(
        &self,
        guild_id: i64,
        limit: i64,
    ) -> Result<Vec<UserStats>, AppError> {
        let _timer = QueryTimer::start("get_guild_leaderboard");
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT user_id, guild_id, quests_completed, quests_accepted, quests_rejected, last_updated
            FROM user_stats
            WHERE guild_id = ?
            ORDER BY quests_completed DESC, user_id ASC
            LIMIT ?
            "#,
        )
        .bind(guild_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Guild-wide sums over quests and user stats
    pub async fn get_guild_totals(&self, guild_id: i64) -> Result<GuildTotals, AppError> {
        let _timer = QueryTimer::start("get_guild_totals");
        let (total_quests,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM quests WHERE guild_id = ?")
                .bind(guild_id)
                .fetch_one(&self.pool)
                .await?;

        let (total_completed, total_accepted, total_rejected, active_users): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(quests_completed), 0),
                    COALESCE(SUM(quests_accepted), 0),
                    COALESCE(SUM(quests_rejected), 0),
                    COUNT(*)
                FROM user_stats
                WHERE guild_id = ?
                "#,
            )
            .bind(guild_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(GuildTotals {
            total_quests,
            total_completed,
            total_accepted,
            total_rejected,
            active_users,
        })
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Progress tallies for one quest
    pub async fn get_quest_outcomes(
        &self,
        quest_id: &str,
    ) -> Result<Option<QuestOutcomes>, AppError> {
        let _timer = QueryTimer::start("get_quest_outcomes");
        let outcomes = sqlx::query_as::<_, QuestOutcomes>(
            r#"
            SELECT q.*,
                COUNT(p.id) AS accepts,
                COALESCE(SUM(CASE WHEN p.status = 'approved' THEN 1 ELSE 0 END), 0) AS approvals,
                COALESCE(SUM(CASE WHEN p.status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejections
            FROM quests q
            LEFT JOIN quest_progress p ON p.quest_id = q.quest_id
            WHERE q.quest_id = ?
            GROUP BY q.quest_id
            "#,
        )
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcomes)
    }

    /// Progress tallies for every quest of a guild, newest quest first
    ///
    /// With `accepted_since`, only progress accepted at or after that
    /// instant is counted and quests without such progress are omitted.
    pub async fn get_guild_outcomes(
        &self,
        guild_id: i64,
        accepted_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<QuestOutcomes>, AppError> {
        let _timer = QueryTimer::start("get_guild_outcomes");
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT q.*,
                COUNT(p.id) AS accepts,
                COALESCE(SUM(CASE WHEN p.status = 'approved' THEN 1 ELSE 0 END), 0) AS approvals,
                COALESCE(SUM(CASE WHEN p.status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejections
            FROM quests q
            "#,
        );

        match accepted_since {
            Some(since) => {
                query
                    .push("JOIN quest_progress p ON p.quest_id = q.quest_id AND p.accepted_at >= ")
                    .push_bind(since);
            }
            None => {
                query.push("LEFT JOIN quest_progress p ON p.quest_id = q.quest_id");
            }
        }

        query
            .push(" WHERE q.guild_id = ")
            .push_bind(guild_id)
            .push(" GROUP BY q.quest_id ORDER BY q.created_at DESC, q.rowid DESC");

        let outcomes = query
            .build_query_as::<QuestOutcomes>()
            .fetch_all(&self.pool)
            .await?;

        Ok(outcomes)
    }

    /// Distinct users with any progress in a guild
    pub async fn count_guild_participants(&self, guild_id: i64) -> Result<i64, AppError> {
        let _timer = QueryTimer::start("count_guild_participants");
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT p.user_id)
            FROM quest_progress p
            JOIN quests q ON q.quest_id = p.quest_id
            WHERE q.guild_id = ?
            "#,
        )
        .bind(guild_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Channel configuration
    // =========================================================================

    /// Create or replace the channel routing of a guild
    pub async fn upsert_channel_config(&self, config: &ChannelConfig) -> Result<(), AppError> {
        let _timer = QueryTimer::start("upsert_channel_config");
        sqlx::query(
            r#"
            INSERT INTO channel_config (
                guild_id, quest_list_channel, quest_accept_channel, quest_submit_channel,
                quest_approval_channel, notification_channel
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                quest_list_channel = excluded.quest_list_channel,
                quest_accept_channel = excluded.quest_accept_channel,
                quest_submit_channel = excluded.quest_submit_channel,
                quest_approval_channel = excluded.quest_approval_channel,
                notification_channel = excluded.notification_channel
            "#,
        )
        .bind(config.guild_id)
        .bind(config.quest_list_channel)
        .bind(config.quest_accept_channel)
        .bind(config.quest_submit_channel)
        .bind(config.quest_approval_channel)
        .bind(config.notification_channel)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_channel_config(
        &self,
        guild_id: i64,
    ) -> Result<Option<ChannelConfig>, AppError> {
        let _timer = QueryTimer::start("get_channel_config");
        let config =
            sqlx::query_as::<_, ChannelConfig>("SELECT * FROM channel_config WHERE guild_id = ?")
                .bind(guild_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(config)
    }

    // =========================================================================
    // Bookmarks
    // =========================================================================

    /// Save a bookmark, refreshing notes and timestamp if it already exists
    pub async fn upsert_bookmark(
        &self,
        bookmark: &QuestBookmark,
    ) -> Result<BookmarkChange, AppError> {
        let _timer = QueryTimer::start("upsert_bookmark");
        let inserted = sqlx::query(
            r#"
            INSERT INTO quest_bookmarks (user_id, guild_id, quest_id, bookmarked_at, notes)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, quest_id) DO NOTHING
            "#,
        )
        .bind(bookmark.user_id)
        .bind(bookmark.guild_id)
        .bind(&bookmark.quest_id)
        .bind(bookmark.bookmarked_at)
        .bind(&bookmark.notes)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            return Ok(BookmarkChange::Created);
        }

        sqlx::query(
            r#"
            UPDATE quest_bookmarks SET bookmarked_at = ?, notes = ?
            WHERE user_id = ? AND quest_id = ?
            "#,
        )
        .bind(bookmark.bookmarked_at)
        .bind(&bookmark.notes)
        .bind(bookmark.user_id)
        .bind(&bookmark.quest_id)
        .execute(&self.pool)
        .await?;

        Ok(BookmarkChange::Updated)
    }

    /// # Returns
    /// `true` if a bookmark was removed
    pub async fn delete_bookmark(&self, user_id: i64, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_bookmark");
        let result = sqlx::query("DELETE FROM quest_bookmarks WHERE user_id = ? AND quest_id = ?")
            .bind(user_id)
            .bind(quest_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bookmarks of a user, newest first, optionally limited to one guild
    pub async fn get_user_bookmarks(
        &self,
        user_id: i64,
        guild_id: Option<i64>,
    ) -> Result<Vec<QuestBookmark>, AppError> {
        let _timer = QueryTimer::start("get_user_bookmarks");
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT user_id, guild_id, quest_id, bookmarked_at, notes FROM quest_bookmarks WHERE user_id = ",
        );
        query.push_bind(user_id);
        if let Some(guild_id) = guild_id {
            query.push(" AND guild_id = ").push_bind(guild_id);
        }
        query.push(" ORDER BY bookmarked_at DESC, id DESC");

        let bookmarks = query
            .build_query_as::<QuestBookmark>()
            .fetch_all(&self.pool)
            .await?;

        Ok(bookmarks)
    }

    pub async fn is_bookmarked(&self, user_id: i64, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("is_bookmarked");
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM quest_bookmarks WHERE user_id = ? AND quest_id = ?")
                .bind(user_id)
                .bind(quest_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(exists.is_some())
    }

    pub async fn count_bookmarks(&self, quest_id: &str) -> Result<i64, AppError> {
        let _timer = QueryTimer::start("count_bookmarks");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quest_bookmarks WHERE quest_id = ?")
            .bind(quest_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Deadlines
    // =========================================================================

    /// Create or move a deadline, clearing both idempotence flags
    pub async fn upsert_deadline(
        &self,
        quest_id: &str,
        deadline: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let _timer = QueryTimer::start("upsert_deadline");
        sqlx::query(
            r#"
            INSERT INTO quest_deadlines (quest_id, deadline, warning_sent, expired)
            VALUES (?, ?, 0, 0)
            ON CONFLICT(quest_id) DO UPDATE SET
                deadline = excluded.deadline,
                warning_sent = 0,
                expired = 0
            "#,
        )
        .bind(quest_id)
        .bind(deadline)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// # Returns
    /// `true` if a deadline was removed
    pub async fn delete_deadline(&self, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_deadline");
        let result = sqlx::query("DELETE FROM quest_deadlines WHERE quest_id = ?")
            .bind(quest_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_deadline(&self, quest_id: &str) -> Result<Option<QuestDeadline>, AppError> {
        let _timer = QueryTimer::start("get_deadline");
        let deadline =
            sqlx::query_as::<_, QuestDeadline>("SELECT * FROM quest_deadlines WHERE quest_id = ?")
                .bind(quest_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(deadline)
    }

    /// Deadlines not yet expired, earliest first
    pub async fn get_pending_deadlines(&self) -> Result<Vec<QuestDeadline>, AppError> {
        let _timer = QueryTimer::start("get_pending_deadlines");
        let deadlines = sqlx::query_as::<_, QuestDeadline>(
            "SELECT * FROM quest_deadlines WHERE expired = 0 ORDER BY deadline ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(deadlines)
    }

    /// Claim the one-time warning for a deadline
    ///
    /// # Returns
    /// `true` for exactly one caller per deadline
    pub async fn claim_deadline_warning(&self, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("claim_deadline_warning");
        let result = sqlx::query(
            r#"
            UPDATE quest_deadlines SET warning_sent = 1
            WHERE quest_id = ? AND warning_sent = 0 AND expired = 0
            "#,
        )
        .bind(quest_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim expiry of a deadline and cancel its quest in one transaction
    ///
    /// # Returns
    /// `true` for exactly one caller per deadline
    pub async fn expire_deadline(&self, quest_id: &str) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("expire_deadline");
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE quest_deadlines SET expired = 1 WHERE quest_id = ? AND expired = 0",
        )
        .bind(quest_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE quests SET status = ? WHERE quest_id = ?")
            .bind(QuestStatus::Cancelled)
            .bind(quest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    // =========================================================================
    // Recurring quests
    // =========================================================================

    pub async fn insert_recurring_quest(&self, schedule: &RecurringQuest) -> Result<(), AppError> {
        let _timer = QueryTimer::start("insert_recurring_quest");
        sqlx::query(
            r#"
            INSERT INTO recurring_quests (
                id, template_id, guild_id, creator_id, interval_type, interval_value,
                last_created, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(&schedule.template_id)
        .bind(schedule.guild_id)
        .bind(schedule.creator_id)
        .bind(schedule.interval)
        .bind(schedule.interval_value)
        .bind(schedule.last_created)
        .bind(schedule.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_recurring_quest(&self, id: &str) -> Result<Option<RecurringQuest>, AppError> {
        let _timer = QueryTimer::start("get_recurring_quest");
        let schedule =
            sqlx::query_as::<_, RecurringQuest>("SELECT * FROM recurring_quests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(schedule)
    }

    /// Schedules of a guild, active or not
    pub async fn list_recurring_quests(
        &self,
        guild_id: i64,
    ) -> Result<Vec<RecurringQuest>, AppError> {
        let _timer = QueryTimer::start("list_recurring_quests");
        let schedules = sqlx::query_as::<_, RecurringQuest>(
            "SELECT * FROM recurring_quests WHERE guild_id = ? ORDER BY id ASC",
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    /// Active schedules across all guilds
    pub async fn get_active_recurring_quests(&self) -> Result<Vec<RecurringQuest>, AppError> {
        let _timer = QueryTimer::start("get_active_recurring_quests");
        let schedules = sqlx::query_as::<_, RecurringQuest>(
            "SELECT * FROM recurring_quests WHERE is_active = 1 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    /// # Returns
    /// `true` if an active schedule of that guild was switched off
    pub async fn deactivate_recurring_quest(
        &self,
        id: &str,
        guild_id: i64,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("deactivate_recurring_quest");
        let result = sqlx::query(
            "UPDATE recurring_quests SET is_active = 0 WHERE id = ? AND guild_id = ? AND is_active = 1",
        )
        .bind(id)
        .bind(guild_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Advance a schedule and insert its next instance in one transaction
    ///
    /// `last_created` moves from `observed_last_created` to `now` only if
    /// nobody advanced it first.
    ///
    /// # Returns
    /// `false` if the swap was lost and nothing was created
    pub async fn advance_recurring_quest(
        &self,
        id: &str,
        observed_last_created: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        instance: &Quest,
    ) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("advance_recurring_quest");
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE recurring_quests SET last_created = ?
            WHERE id = ? AND is_active = 1 AND last_created IS ?
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(observed_last_created)
        .execute(&mut *tx)
        .await?;

        if swapped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_quest_with(&mut *tx, instance).await?;

        tx.commit().await?;

        Ok(true)
    }

    // =========================================================================
    // Teams
    // =========================================================================

    /// Create a team with its leader as first member
    ///
    /// # Returns
    /// `false` if the quest already has a team
    pub async fn insert_team(&self, team: &TeamQuest) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("insert_team");
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO team_quests (
                quest_id, guild_id, team_size_required, team_leader, is_team_complete, team_formed_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(quest_id) DO NOTHING
            "#,
        )
        .bind(&team.quest_id)
        .bind(team.guild_id)
        .bind(team.team_size_required)
        .bind(team.team_leader)
        .bind(team.is_team_complete)
        .bind(team.team_formed_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO team_members (quest_id, user_id, guild_id, team_role, joined_team_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&team.quest_id)
        .bind(team.team_leader)
        .bind(team.guild_id)
        .bind(TeamRole::Leader)
        .bind(team.team_formed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    pub async fn get_team(&self, quest_id: &str) -> Result<Option<TeamQuest>, AppError> {
        let _timer = QueryTimer::start("get_team");
        let team = sqlx::query_as::<_, TeamQuest>("SELECT * FROM team_quests WHERE quest_id = ?")
            .bind(quest_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(team)
    }

    /// Members in join order, leader first
    pub async fn get_team_members(&self, quest_id: &str) -> Result<Vec<TeamMember>, AppError> {
        let _timer = QueryTimer::start("get_team_members");
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT quest_id, user_id, guild_id, team_role, joined_team_at
            FROM team_members
            WHERE quest_id = ?
            ORDER BY joined_team_at ASC, id ASC
            "#,
        )
        .bind(quest_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Add a member while seats remain, completing the team on the last seat
    ///
    /// # Errors
    /// * `NotFound` - the quest has no team
    /// * `AlreadyActive` - the user is already a member
    /// * `Validation` - the team is full
    pub async fn join_team(
        &self,
        quest_id: &str,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TeamJoin, AppError> {
        let _timer = QueryTimer::start("join_team");
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO team_members (quest_id, user_id, guild_id, team_role, joined_team_at)
            SELECT t.quest_id, ?, t.guild_id, ?, ?
            FROM team_quests t
            WHERE t.quest_id = ?
                AND (SELECT COUNT(*) FROM team_members m WHERE m.quest_id = t.quest_id)
                    < t.team_size_required
            ON CONFLICT(quest_id, user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(TeamRole::Member)
        .bind(now)
        .bind(quest_id)
        .execute(&mut *tx)
        .await?;

        let team = sqlx::query_as::<_, TeamQuest>("SELECT * FROM team_quests WHERE quest_id = ?")
            .bind(quest_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(team) = team else {
            tx.rollback().await?;
            return Err(AppError::NotFound);
        };

        if inserted.rows_affected() == 0 {
            let is_member: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM team_members WHERE quest_id = ? AND user_id = ?",
            )
            .bind(quest_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Err(if is_member.is_some() {
                AppError::AlreadyActive("You are already a member of this team".to_string())
            } else {
                AppError::Validation("Team is already full".to_string())
            });
        }

        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE quest_id = ?")
                .bind(quest_id)
                .fetch_one(&mut *tx)
                .await?;

        let team_complete = member_count >= team.team_size_required;
        if team_complete {
            sqlx::query("UPDATE team_quests SET is_team_complete = 1 WHERE quest_id = ?")
                .bind(quest_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(TeamJoin {
            member_count,
            team_complete,
        })
    }
}

// =============================================================================
// Shared statements
// =============================================================================

async fn insert_quest_with<'e, E>(executor: E, quest: &Quest) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let required_role_ids = encode_json(&quest.required_role_ids)?;

    sqlx::query(
        r#"
        INSERT INTO quests (
            quest_id, title, description, creator_id, guild_id, requirements, reward,
            rank, category, status, created_at, required_role_ids
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&quest.quest_id)
    .bind(&quest.title)
    .bind(&quest.description)
    .bind(quest.creator_id)
    .bind(quest.guild_id)
    .bind(&quest.requirements)
    .bind(&quest.reward)
    .bind(quest.rank)
    .bind(quest.category)
    .bind(quest.status)
    .bind(quest.created_at)
    .bind(&required_role_ids)
    .execute(executor)
    .await?;

    Ok(())
}

/// Atomic `+1` upsert on one stats counter
async fn increment_stat_with<'e, E>(
    executor: E,
    user_id: i64,
    guild_id: i64,
    counter: StatCounter,
    now: DateTime<Utc>,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let column = counter.column();
    let statement = format!(
        r#"
        INSERT INTO user_stats (user_id, guild_id, {column}, last_updated)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(user_id, guild_id) DO UPDATE SET
            {column} = user_stats.{column} + 1,
            last_updated = excluded.last_updated
        "#
    );

    sqlx::query(&statement)
        .bind(user_id)
        .bind(guild_id)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}
