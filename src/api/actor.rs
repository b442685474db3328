//! Acting member extraction
//!
//! The chat front end authenticates members and forwards who is acting
//! through request headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use crate::error::AppError;
use crate::service::Actor;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const GUILD_ID_HEADER: &str = "x-guild-id";
pub const ROLE_IDS_HEADER: &str = "x-role-ids";
pub const ROLE_NAMES_HEADER: &str = "x-role-names";
pub const GUILD_PERMISSIONS_HEADER: &str = "x-guild-permissions";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required_id(headers: &HeaderMap, name: &str) -> Result<i64, AppError> {
    header_str(headers, name)
        .and_then(|value| value.parse().ok())
        .ok_or(AppError::Unauthorized)
}

fn comma_list(headers: &HeaderMap, name: &str) -> Vec<String> {
    header_str(headers, name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Build an actor from forwarded headers
///
/// `X-User-Id` and `X-Guild-Id` are required. Role IDs, role names and
/// guild permission flags are comma separated; unknown permission flags
/// are ignored.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let mut actor = Actor {
        user_id: required_id(headers, USER_ID_HEADER)?,
        guild_id: required_id(headers, GUILD_ID_HEADER)?,
        role_names: comma_list(headers, ROLE_NAMES_HEADER),
        ..Actor::default()
    };

    for role_id in comma_list(headers, ROLE_IDS_HEADER) {
        let role_id = role_id
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid role ID: {role_id}")))?;
        actor.role_ids.push(role_id);
    }

    for permission in comma_list(headers, GUILD_PERMISSIONS_HEADER) {
        match permission.to_lowercase().as_str() {
            "owner" => actor.is_guild_owner = true,
            "administrator" => actor.is_administrator = true,
            "manage_guild" => actor.can_manage_guild = true,
            "manage_channels" => actor.can_manage_channels = true,
            _ => {}
        }
    }

    Ok(actor)
}

/// Extractor for the member making the request
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentActor(actor): CurrentActor,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", actor.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>().cloned() {
            return Ok(CurrentActor(actor));
        }

        let actor = actor_from_headers(&parts.headers)?;
        parts.extensions.insert(actor.clone());

        Ok(CurrentActor(actor))
    }
}
