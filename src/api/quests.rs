//! Quest endpoints
//!
//! Creation, listing and the per-member lifecycle: accept, submit proof,
//! approve or reject.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::actor::CurrentActor;
use super::dto::{
    AcceptQuestRequest, CreateQuestRequest, SearchParams, SubmitProofRequest, TemplateParams,
    TemplateQuestRequest,
};
use crate::AppState;
use crate::data::{NewQuest, PendingApproval, Quest, QuestAnalytics, QuestProgress, UserStats};
use crate::error::AppError;
use crate::service::templates::{self, QuestTemplate};
use crate::service::{Actor, SearchQuery};

fn require_creator(state: &AppState, actor: &Actor) -> Result<(), AppError> {
    if state.policy.can_create_quests(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Tenant-scoped lookup followed by the manage check
pub(super) async fn managed_quest(
    state: &AppState,
    actor: &Actor,
    quest_id: &str,
) -> Result<Quest, AppError> {
    let quest = state.quests.get_quest_in_guild(quest_id, actor.guild_id).await?;
    if !state.policy.can_manage_quest(actor, &quest) {
        return Err(AppError::Forbidden);
    }
    Ok(quest)
}

/// POST /api/v1/quests
pub async fn create_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateQuestRequest>,
) -> Result<(StatusCode, Json<Quest>), AppError> {
    require_creator(&state, &actor)?;

    let quest = state
        .quests
        .create_quest(NewQuest {
            title: req.title,
            description: req.description,
            creator_id: actor.user_id,
            guild_id: actor.guild_id,
            requirements: req.requirements,
            reward: req.reward,
            rank: req.rank,
            category: req.category,
            required_role_ids: req.required_role_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quest)))
}

/// POST /api/v1/quests/from_template
pub async fn create_quest_from_template(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<TemplateQuestRequest>,
) -> Result<(StatusCode, Json<Quest>), AppError> {
    require_creator(&state, &actor)?;

    let quest = state
        .quests
        .create_quest_from_template(&req.template_id, req.overrides, actor.user_id, actor.guild_id)
        .await?;

    Ok((StatusCode::CREATED, Json(quest)))
}

/// GET /api/v1/quests
pub async fn list_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Quest>>, AppError> {
    Ok(Json(state.quests.get_guild_quests(actor.guild_id).await?))
}

/// GET /api/v1/quests/available
pub async fn available_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Quest>>, AppError> {
    Ok(Json(state.quests.get_available_quests(actor.guild_id).await?))
}

/// GET /api/v1/quests/:id
pub async fn get_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Quest>, AppError> {
    Ok(Json(state.quests.get_quest_in_guild(&id, actor.guild_id).await?))
}

/// DELETE /api/v1/quests/:id
pub async fn delete_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let quest = managed_quest(&state, &actor, &id).await?;

    if state.quests.delete_quest(&quest.quest_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// POST /api/v1/quests/:id/accept
pub async fn accept_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    body: Option<Json<AcceptQuestRequest>>,
) -> Result<(StatusCode, Json<QuestProgress>), AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    let channel_id = body.and_then(|Json(req)| req.channel_id);

    let progress = state
        .quests
        .accept_quest(&quest.quest_id, actor.user_id, &actor.role_ids, channel_id)
        .await?;

    Ok((StatusCode::CREATED, Json(progress)))
}

/// POST /api/v1/quests/:id/submit
pub async fn submit_proof(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SubmitProofRequest>,
) -> Result<Json<QuestProgress>, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;

    let progress = state
        .quests
        .complete_quest(
            &quest.quest_id,
            actor.user_id,
            &req.proof_text,
            &req.proof_attachments,
        )
        .await?;

    Ok(Json(progress))
}

async fn review(
    state: &AppState,
    actor: &Actor,
    quest_id: &str,
    user_id: i64,
    approved: bool,
) -> Result<Json<QuestProgress>, AppError> {
    let quest = managed_quest(state, actor, quest_id).await?;
    let progress = state
        .quests
        .approve_quest(&quest.quest_id, user_id, approved)
        .await?;
    Ok(Json(progress))
}

/// POST /api/v1/quests/:id/approve/:user_id
pub async fn approve_submission(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, user_id)): Path<(String, i64)>,
) -> Result<Json<QuestProgress>, AppError> {
    review(&state, &actor, &id, user_id, true).await
}

/// POST /api/v1/quests/:id/reject/:user_id
pub async fn reject_submission(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, user_id)): Path<(String, i64)>,
) -> Result<Json<QuestProgress>, AppError> {
    review(&state, &actor, &id, user_id, false).await
}

/// GET /api/v1/quests/:id/analytics
pub async fn quest_analytics(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<QuestAnalytics>, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    Ok(Json(state.stats.get_quest_analytics(&quest.quest_id).await?))
}

/// GET /api/v1/me/quests
pub async fn my_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<QuestProgress>>, AppError> {
    Ok(Json(
        state
            .quests
            .get_user_quests(actor.user_id, actor.guild_id)
            .await?,
    ))
}

/// GET /api/v1/me/stats
pub async fn my_stats(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(
        state
            .stats
            .get_user_stats(actor.user_id, actor.guild_id)
            .await?,
    ))
}

/// GET /api/v1/me/approvals
pub async fn my_pending_approvals(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<PendingApproval>>, AppError> {
    Ok(Json(
        state
            .quests
            .get_pending_approvals(actor.user_id, actor.guild_id)
            .await?,
    ))
}

/// GET /api/v1/templates
pub async fn list_templates(
    CurrentActor(_actor): CurrentActor,
    Query(params): Query<TemplateParams>,
) -> Json<Vec<QuestTemplate>> {
    let catalog = match params.category {
        Some(category) => templates::templates_by_category(category)
            .into_iter()
            .cloned()
            .collect(),
        None => templates::all_templates().to_vec(),
    };
    Json(catalog)
}

/// GET /api/v1/search
pub async fn search_quests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Quest>>, AppError> {
    let results = state
        .search
        .search_quests(&SearchQuery {
            guild_id: actor.guild_id,
            keyword: params.keyword,
            rank: params.rank,
            category: params.category,
            limit: params.limit,
        })
        .await?;
    Ok(Json(results))
}
