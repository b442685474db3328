//! Bookmark endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::actor::CurrentActor;
use super::dto::{BookmarkRequest, BookmarkResponse};
use crate::AppState;
use crate::data::{BookmarkChange, QuestBookmark};
use crate::error::AppError;

/// GET /api/v1/bookmarks
pub async fn get_bookmarks(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<QuestBookmark>>, AppError> {
    Ok(Json(
        state
            .bookmarks
            .get_user_bookmarks(actor.user_id, Some(actor.guild_id))
            .await?,
    ))
}

/// POST /api/v1/quests/:id/bookmark
///
/// Bookmarking again refreshes the notes and timestamp.
pub async fn bookmark_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    body: Option<Json<BookmarkRequest>>,
) -> Result<(StatusCode, Json<BookmarkResponse>), AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;
    let notes = body.map(|Json(req)| req.notes).unwrap_or_default();

    let change = state
        .bookmarks
        .add_bookmark(actor.user_id, &quest.quest_id, &notes)
        .await?;
    let bookmark_count = state.bookmarks.get_bookmark_count(&quest.quest_id).await?;

    let status = match change {
        BookmarkChange::Created => StatusCode::CREATED,
        BookmarkChange::Updated => StatusCode::OK,
    };
    Ok((
        status,
        Json(BookmarkResponse {
            quest_id: quest.quest_id,
            change,
            bookmark_count,
        }),
    ))
}

/// DELETE /api/v1/quests/:id/bookmark
pub async fn unbookmark_quest(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let quest = state.quests.get_quest_in_guild(&id, actor.guild_id).await?;

    if state
        .bookmarks
        .remove_bookmark(actor.user_id, &quest.quest_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
