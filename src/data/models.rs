//! Data models
//!
//! Rust structs representing database entities.
//! Quest and schedule IDs are ULIDs; timestamps are chrono UTC.
//! Platform identifiers (users, guilds, roles, channels) are `i64`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when parsing one of the closed string enums fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// Quest
// =============================================================================

/// Difficulty tier, ordered from easiest to hardest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestRank {
    Easy,
    #[default]
    Normal,
    Medium,
    Hard,
    Impossible,
}

string_enum!(QuestRank, "rank", {
    Easy => "easy",
    Normal => "normal",
    Medium => "medium",
    Hard => "hard",
    Impossible => "impossible",
});

/// Closed set of quest categories
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestCategory {
    Hunting,
    Gathering,
    Collecting,
    Crafting,
    Exploration,
    Combat,
    Social,
    Building,
    Trading,
    Puzzle,
    Survival,
    #[default]
    Other,
}

string_enum!(QuestCategory, "category", {
    Hunting => "hunting",
    Gathering => "gathering",
    Collecting => "collecting",
    Crafting => "crafting",
    Exploration => "exploration",
    Combat => "combat",
    Social => "social",
    Building => "building",
    Trading => "trading",
    Puzzle => "puzzle",
    Survival => "survival",
    Other => "other",
});

/// Summary status of a quest definition
///
/// Independent of per-user progress: a quest stays `Available`
/// while users accept, submit, and get rejected on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestStatus {
    #[default]
    Available,
    Accepted,
    Completed,
    Approved,
    Rejected,
    Cancelled,
}

string_enum!(QuestStatus, "quest status", {
    Available => "available",
    Accepted => "accepted",
    Completed => "completed",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

/// A quest definition owned by its creator within one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub quest_id: String,
    pub title: String,
    pub description: String,
    pub creator_id: i64,
    pub guild_id: i64,
    pub requirements: String,
    pub reward: String,
    pub rank: QuestRank,
    pub category: QuestCategory,
    pub status: QuestStatus,
    pub created_at: DateTime<Utc>,
    /// Empty means anyone may accept
    pub required_role_ids: Vec<i64>,
}

impl Quest {
    /// Whether a member holding `user_role_ids` passes the role gate
    pub fn role_gate_allows(&self, user_role_ids: &[i64]) -> bool {
        self.required_role_ids.is_empty()
            || self
                .required_role_ids
                .iter()
                .any(|required| user_role_ids.contains(required))
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Quest {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            quest_id: row.try_get("quest_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            creator_id: row.try_get("creator_id")?,
            guild_id: row.try_get("guild_id")?,
            requirements: row.try_get("requirements")?,
            reward: row.try_get("reward")?,
            rank: row.try_get("rank")?,
            category: row.try_get("category")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            required_role_ids: decode_json_column(row, "required_role_ids")?,
        })
    }
}

/// Input for quest creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewQuest {
    pub title: String,
    pub description: String,
    pub creator_id: i64,
    pub guild_id: i64,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub reward: String,
    #[serde(default)]
    pub rank: QuestRank,
    #[serde(default)]
    pub category: QuestCategory,
    #[serde(default)]
    pub required_role_ids: Vec<i64>,
}

// =============================================================================
// Progress
// =============================================================================

/// Lifecycle state of one user's attempt at one quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProgressStatus {
    Accepted,
    Completed,
    Approved,
    Rejected,
}

string_enum!(ProgressStatus, "progress status", {
    Accepted => "accepted",
    Completed => "completed",
    Approved => "approved",
    Rejected => "rejected",
});

/// One user's attempt at one quest, unique per (user_id, quest_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub quest_id: String,
    pub user_id: i64,
    pub guild_id: i64,
    pub status: ProgressStatus,
    pub accepted_at: DateTime<Utc>,
    /// Submission time. Also the reference point of the rejection cooldown.
    pub completed_at: Option<DateTime<Utc>>,
    /// Time of the approve/reject decision
    pub reviewed_at: Option<DateTime<Utc>>,
    pub proof_text: String,
    pub proof_attachments: Vec<String>,
    /// "approved", "rejected", or empty while undecided
    pub approval_status: String,
    /// Channel the quest was accepted from
    pub channel_id: Option<i64>,
}

impl QuestProgress {
    /// Fresh accepted attempt
    pub fn accepted(
        quest: &Quest,
        user_id: i64,
        channel_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            quest_id: quest.quest_id.clone(),
            user_id,
            guild_id: quest.guild_id,
            status: ProgressStatus::Accepted,
            accepted_at: now,
            completed_at: None,
            reviewed_at: None,
            proof_text: String::new(),
            proof_attachments: Vec::new(),
            approval_status: String::new(),
            channel_id,
        }
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for QuestProgress {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            quest_id: row.try_get("quest_id")?,
            user_id: row.try_get("user_id")?,
            guild_id: row.try_get("guild_id")?,
            status: row.try_get("status")?,
            accepted_at: row.try_get("accepted_at")?,
            completed_at: row.try_get("completed_at")?,
            reviewed_at: row.try_get("reviewed_at")?,
            proof_text: row.try_get("proof_text")?,
            proof_attachments: decode_json_column(row, "proof_attachments")?,
            approval_status: row.try_get("approval_status")?,
            channel_id: row.try_get("accepted_channel_id")?,
        })
    }
}

/// A completed submission waiting for review on a creator's quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub quest_id: String,
    pub title: String,
    pub user_id: i64,
    pub proof_text: String,
    pub proof_attachments: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for PendingApproval {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            quest_id: row.try_get("quest_id")?,
            title: row.try_get("title")?,
            user_id: row.try_get("user_id")?,
            proof_text: row.try_get("proof_text")?,
            proof_attachments: decode_json_column(row, "proof_attachments")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Per-user, per-guild event tallies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserStats {
    pub user_id: i64,
    pub guild_id: i64,
    pub quests_completed: i64,
    pub quests_accepted: i64,
    pub quests_rejected: i64,
    pub last_updated: DateTime<Utc>,
}

/// Which counter a lifecycle transition bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCounter {
    Accepted,
    Completed,
    Rejected,
}

impl StatCounter {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Accepted => "quests_accepted",
            Self::Completed => "quests_completed",
            Self::Rejected => "quests_rejected",
        }
    }
}

/// Guild-wide sums over user stats
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildTotals {
    pub total_quests: i64,
    pub total_completed: i64,
    pub total_accepted: i64,
    pub total_rejected: i64,
    pub active_users: i64,
}

/// Raw progress tallies for one quest, as counted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestOutcomes {
    pub quest: Quest,
    /// Every progress row, whatever its state
    pub accepts: i64,
    pub approvals: i64,
    pub rejections: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for QuestOutcomes {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            quest: <Quest as sqlx::FromRow<'r, SqliteRow>>::from_row(row)?,
            accepts: row.try_get("accepts")?,
            approvals: row.try_get("approvals")?,
            rejections: row.try_get("rejections")?,
        })
    }
}

/// Outcome counts for one quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestAnalytics {
    pub quest_id: String,
    pub title: String,
    pub category: QuestCategory,
    pub rank: QuestRank,
    pub total_accepts: i64,
    pub total_completions: i64,
    pub total_rejections: i64,
    /// Percentage of attempts that were approved
    pub success_rate: f64,
    pub popularity_score: f64,
}

/// Outcome counts aggregated per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: QuestCategory,
    pub total_quests: i64,
    pub total_accepts: i64,
    pub total_completions: i64,
    pub average_success_rate: f64,
}

/// Guild overview used by the analytics dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildAnalytics {
    pub total_quests: i64,
    pub completed_quests: i64,
    pub active_users: i64,
    pub success_rate: f64,
    pub popular_categories: Vec<(QuestCategory, i64)>,
    pub popular_ranks: Vec<(QuestRank, i64)>,
    pub top_creators: Vec<(i64, i64)>,
}

// =============================================================================
// Channel configuration
// =============================================================================

/// Per-guild channel routing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelConfig {
    pub guild_id: i64,
    pub quest_list_channel: Option<i64>,
    pub quest_accept_channel: Option<i64>,
    pub quest_submit_channel: Option<i64>,
    pub quest_approval_channel: Option<i64>,
    pub notification_channel: Option<i64>,
}

/// The five routed channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    QuestList,
    QuestAccept,
    QuestSubmit,
    QuestApproval,
    Notification,
}

impl ChannelConfig {
    pub fn channel(&self, kind: ChannelKind) -> Option<i64> {
        match kind {
            ChannelKind::QuestList => self.quest_list_channel,
            ChannelKind::QuestAccept => self.quest_accept_channel,
            ChannelKind::QuestSubmit => self.quest_submit_channel,
            ChannelKind::QuestApproval => self.quest_approval_channel,
            ChannelKind::Notification => self.notification_channel,
        }
    }
}

// =============================================================================
// Bookmarks
// =============================================================================

/// A quest saved by a user for later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestBookmark {
    pub user_id: i64,
    pub guild_id: i64,
    pub quest_id: String,
    pub bookmarked_at: DateTime<Utc>,
    pub notes: String,
}

/// Whether `add_bookmark` created a new row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkChange {
    Created,
    Updated,
}

// =============================================================================
// Scheduling
// =============================================================================

/// Durable deadline record with idempotence flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestDeadline {
    pub quest_id: String,
    pub deadline: DateTime<Utc>,
    pub warning_sent: bool,
    pub expired: bool,
}

/// Recurrence unit for recurring quests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecurrenceInterval {
    Daily,
    Weekly,
    /// Fixed 30-day month
    Monthly,
}

string_enum!(RecurrenceInterval, "interval", {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

impl RecurrenceInterval {
    /// Length of `value` consecutive intervals, `None` when out of range
    pub fn span(&self, value: i64) -> Option<Duration> {
        match self {
            Self::Daily => Duration::try_days(value),
            Self::Weekly => Duration::try_weeks(value),
            Self::Monthly => value.checked_mul(30).and_then(Duration::try_days),
        }
    }
}

/// Schedule that materializes a template into a new quest every interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecurringQuest {
    pub id: String,
    pub template_id: String,
    pub guild_id: i64,
    pub creator_id: i64,
    #[sqlx(rename = "interval_type")]
    pub interval: RecurrenceInterval,
    pub interval_value: i64,
    pub last_created: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl RecurringQuest {
    /// When the instance following one created at `last` becomes due
    ///
    /// `None` when the stored interval does not fit in a timestamp.
    pub fn next_due_after(&self, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.interval
            .span(self.interval_value)
            .and_then(|span| last.checked_add_signed(span))
    }
}

// =============================================================================
// Teams
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TeamRole {
    Leader,
    Member,
}

/// Team attached to a quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamQuest {
    pub quest_id: String,
    pub guild_id: i64,
    pub team_size_required: i64,
    pub team_leader: i64,
    pub is_team_complete: bool,
    pub team_formed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub quest_id: String,
    pub user_id: i64,
    pub guild_id: i64,
    pub team_role: TeamRole,
    pub joined_team_at: DateTime<Utc>,
}

/// Outcome of a join attempt that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamJoin {
    pub member_count: i64,
    pub team_complete: bool,
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn decode_json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
