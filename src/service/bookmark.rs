//! Bookmark service
//!
//! Users save quests for later; a bookmark lives in the quest's guild.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{BookmarkChange, Database, QuestBookmark};
use crate::error::AppError;

/// Bookmark service
pub struct BookmarkService {
    db: Arc<Database>,
}

impl BookmarkService {
    /// Create new bookmark service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Bookmark a quest, or refresh notes and timestamp of an existing one
    ///
    /// # Errors
    /// `NotFound` if the quest does not exist
    pub async fn add_bookmark(
        &self,
        user_id: i64,
        quest_id: &str,
        notes: &str,
    ) -> Result<BookmarkChange, AppError> {
        let quest = self
            .db
            .get_quest(quest_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let change = self
            .db
            .upsert_bookmark(&QuestBookmark {
                user_id,
                guild_id: quest.guild_id,
                quest_id: quest.quest_id,
                bookmarked_at: Utc::now(),
                notes: notes.to_string(),
            })
            .await?;

        tracing::debug!(quest_id, user_id, ?change, "Bookmark saved");
        Ok(change)
    }

    pub async fn remove_bookmark(&self, user_id: i64, quest_id: &str) -> Result<bool, AppError> {
        self.db.delete_bookmark(user_id, quest_id).await
    }

    /// Bookmarks of a user, newest first
    pub async fn get_user_bookmarks(
        &self,
        user_id: i64,
        guild_id: Option<i64>,
    ) -> Result<Vec<QuestBookmark>, AppError> {
        self.db.get_user_bookmarks(user_id, guild_id).await
    }

    pub async fn is_bookmarked(&self, user_id: i64, quest_id: &str) -> Result<bool, AppError> {
        self.db.is_bookmarked(user_id, quest_id).await
    }

    pub async fn get_bookmark_count(&self, quest_id: &str) -> Result<i64, AppError> {
        self.db.count_bookmarks(quest_id).await
    }
}
