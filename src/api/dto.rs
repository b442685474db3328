//! Request and response DTOs
//!
//! Bodies and query strings of the HTTP API. Domain models are returned
//! directly where their shape is already the response.

use serde::{Deserialize, Serialize};

use crate::data::{
    BookmarkChange, QuestCategory, QuestDeadline, QuestRank, RecurrenceInterval, TeamMember,
    TeamQuest,
};
use crate::service::TemplateOverrides;

/// POST /api/v1/quests body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
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

/// POST /api/v1/quests/from_template body
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateQuestRequest {
    pub template_id: String,
    #[serde(flatten)]
    pub overrides: TemplateOverrides,
}

/// POST /api/v1/quests/:id/accept body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcceptQuestRequest {
    /// Channel the acceptance happened in
    pub channel_id: Option<i64>,
}

/// POST /api/v1/quests/:id/submit body
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitProofRequest {
    pub proof_text: String,
    #[serde(default)]
    pub proof_attachments: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateParams {
    pub category: Option<QuestCategory>,
}

/// Search parameters; the guild comes from the acting member
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: String,
    pub rank: Option<QuestRank>,
    pub category: Option<QuestCategory>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendingParams {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

/// POST /api/v1/quests/:id/bookmark body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkResponse {
    pub quest_id: String,
    pub change: BookmarkChange,
    pub bookmark_count: i64,
}

/// POST /api/v1/quests/:id/team body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub team_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: TeamQuest,
    pub members: Vec<TeamMember>,
}

/// PUT /api/v1/quests/:id/deadline body
#[derive(Debug, Clone, Deserialize)]
pub struct SetDeadlineRequest {
    pub hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineResponse {
    pub quest_id: String,
    pub deadline: Option<QuestDeadline>,
}

/// POST /api/v1/recurring body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecurringRequest {
    pub template_id: String,
    pub interval: RecurrenceInterval,
    #[serde(default = "default_interval_value")]
    pub interval_value: i64,
}

fn default_interval_value() -> i64 {
    1
}

/// PUT /api/v1/channels body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfigRequest {
    pub quest_list_channel: Option<i64>,
    pub quest_accept_channel: Option<i64>,
    pub quest_submit_channel: Option<i64>,
    pub quest_approval_channel: Option<i64>,
    pub notification_channel: Option<i64>,
}
