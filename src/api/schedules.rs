//! Deadline and recurring quest endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::actor::CurrentActor;
use super::dto::{CreateRecurringRequest, DeadlineResponse, SetDeadlineRequest};
use super::quests::managed_quest;
use crate::AppState;
use crate::data::{QuestDeadline, RecurringQuest};
use crate::error::AppError;

/// GET /api/v1/quests/:id/deadline
pub async fn get_deadline(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<DeadlineResponse>, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    let deadline = state.scheduler.get_quest_deadline(&quest.quest_id).await?;
    Ok(Json(DeadlineResponse {
        quest_id: quest.quest_id,
        deadline,
    }))
}

/// PUT /api/v1/quests/:id/deadline
pub async fn set_deadline(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SetDeadlineRequest>,
) -> Result<Json<QuestDeadline>, AppError> {
    let quest = managed_quest(&state, &actor, &id).await?;
    Ok(Json(
        state
            .scheduler
            .set_quest_deadline(&quest.quest_id, req.hours)
            .await?,
    ))
}

/// DELETE /api/v1/quests/:id/deadline
pub async fn clear_deadline(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let quest = managed_quest(&state, &actor, &id).await?;

    if state.scheduler.clear_quest_deadline(&quest.quest_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// GET /api/v1/recurring
pub async fn list_recurring(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<RecurringQuest>>, AppError> {
    Ok(Json(
        state
            .scheduler
            .list_recurring_quests(actor.guild_id)
            .await?,
    ))
}

/// POST /api/v1/recurring
pub async fn create_recurring(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateRecurringRequest>,
) -> Result<(StatusCode, Json<RecurringQuest>), AppError> {
    if !state.policy.can_create_quests(&actor) {
        return Err(AppError::Forbidden);
    }

    let schedule = state
        .scheduler
        .create_recurring_quest(
            &req.template_id,
            actor.guild_id,
            actor.user_id,
            req.interval,
            req.interval_value,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// DELETE /api/v1/recurring/:id
pub async fn deactivate_recurring(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.policy.can_create_quests(&actor) {
        return Err(AppError::Forbidden);
    }

    if state
        .scheduler
        .deactivate_recurring_quest(&id, actor.guild_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
