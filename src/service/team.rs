//! Team quests
//!
//! A quest can carry one team with a fixed number of seats. The leader
//! takes the first seat; the team is complete once every seat is filled.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, TeamJoin, TeamMember, TeamQuest};
use crate::error::AppError;

pub const MIN_TEAM_SIZE: i64 = 2;

/// Team service
pub struct TeamService {
    db: Arc<Database>,
}

impl TeamService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Attach a team to a quest
    ///
    /// # Errors
    /// * `Validation` - fewer than two seats
    /// * `NotFound` - unknown quest
    /// * `AlreadyActive` - the quest already has a team
    pub async fn create_team(
        &self,
        quest_id: &str,
        team_size_required: i64,
        leader_id: i64,
    ) -> Result<TeamQuest, AppError> {
        if team_size_required < MIN_TEAM_SIZE {
            return Err(AppError::Validation(format!(
                "Team size must be at least {MIN_TEAM_SIZE}"
            )));
        }

        let quest = self
            .db
            .get_quest(quest_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let team = TeamQuest {
            quest_id: quest.quest_id,
            guild_id: quest.guild_id,
            team_size_required,
            team_leader: leader_id,
            is_team_complete: false,
            team_formed_at: Utc::now(),
        };

        if !self.db.insert_team(&team).await? {
            return Err(AppError::AlreadyActive(
                "A team already exists for this quest".to_string(),
            ));
        }

        tracing::info!(
            quest_id,
            leader_id,
            team_size_required,
            "Team formed"
        );
        Ok(team)
    }

    /// Take a seat on a quest's team
    pub async fn join_team(&self, quest_id: &str, user_id: i64) -> Result<TeamJoin, AppError> {
        let joined = self.db.join_team(quest_id, user_id, Utc::now()).await?;
        tracing::info!(
            quest_id,
            user_id,
            member_count = joined.member_count,
            team_complete = joined.team_complete,
            "Team member joined"
        );
        Ok(joined)
    }

    pub async fn get_team(&self, quest_id: &str) -> Result<TeamQuest, AppError> {
        self.db.get_team(quest_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get_team_members(&self, quest_id: &str) -> Result<Vec<TeamMember>, AppError> {
        self.db.get_team_members(quest_id).await
    }

    pub async fn is_team_complete(&self, quest_id: &str) -> Result<bool, AppError> {
        Ok(self.get_team(quest_id).await?.is_team_complete)
    }
}
