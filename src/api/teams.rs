//! Team quest endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::actor::CurrentActor;
use super::dto::{CreateTeamRequest, TeamResponse};
use crate::AppState;
use crate::data::{TeamJoin, TeamQuest};
use crate::error::AppError;

/// POST /api/v1/quests/:id/team
///
/// The requesting member leads the new team.
pub async fn create_team(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamQuest>), AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    let team = state
        .teams
        .create_team(&quest.quest_id, req.team_size, actor.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// POST /api/v1/quests/:id/team/join
pub async fn join_team(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<TeamJoin>, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    Ok(Json(
        state
            .teams
            .join_team(&quest.quest_id, actor.user_id)
            .await?,
    ))
}

/// GET /api/v1/quests/:id/team
pub async fn get_team(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<TeamResponse>, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    let team = state.teams.get_team(&quest.quest_id).await?;
    let members = state.teams.get_team_members(&quest.quest_id).await?;
    Ok(Json(TeamResponse { team, members }))
}
