//! Quest search
//!
//! Case-insensitive keyword matching over title and description with
//! optional rank and category filters. Results are tenant scoped.

use std::sync::Arc;

use serde::Deserialize;

use crate::data::{Database, Quest, QuestCategory, QuestRank};
use crate::error::AppError;

pub const DEFAULT_SEARCH_LIMIT: i64 = 20;
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Search request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub guild_id: i64,
    /// Blank means no keyword filter
    #[serde(default)]
    pub keyword: String,
    pub rank: Option<QuestRank>,
    pub category: Option<QuestCategory>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }
}

/// Search service
pub struct SearchService {
    db: Arc<Database>,
}

impl SearchService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Matching quests of the query's guild, newest first
    pub async fn search_quests(&self, query: &SearchQuery) -> Result<Vec<Quest>, AppError> {
        let keyword = query.keyword.trim();
        let keyword = (!keyword.is_empty()).then_some(keyword);

        self.db
            .search_quests(
                query.guild_id,
                keyword,
                query.rank,
                query.category,
                query.effective_limit(),
            )
            .await
    }
}
