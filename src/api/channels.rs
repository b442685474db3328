//! Channel routing endpoints

use axum::{extract::State, response::Json};

use super::actor::CurrentActor;
use super::dto::ChannelConfigRequest;
use crate::AppState;
use crate::data::ChannelConfig;
use crate::error::AppError;

/// GET /api/v1/channels
pub async fn get_channels(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ChannelConfig>, AppError> {
    Ok(Json(state.channels.get_guild_config(actor.guild_id).await?))
}

/// PUT /api/v1/channels
///
/// Replaces every route; omitted channels become unset.
pub async fn set_channels(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<ChannelConfigRequest>,
) -> Result<Json<ChannelConfig>, AppError> {
    if !state.policy.can_configure_guild(&actor) {
        return Err(AppError::Forbidden);
    }

    let config = ChannelConfig {
        guild_id: actor.guild_id,
        quest_list_channel: req.quest_list_channel,
        quest_accept_channel: req.quest_accept_channel,
        quest_submit_channel: req.quest_submit_channel,
        quest_approval_channel: req.quest_approval_channel,
        notification_channel: req.notification_channel,
    };
    state.channels.set_guild_channels(&config).await?;
    Ok(Json(config))
}
