//! Handlers for message history, threads and reactions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/messages/:user1/:user2` | `?limit` (default and max 100) |
//! | `GET`  | `/group-messages/:group` | `?limit` (default and max 100) |
//! | `GET`  | `/messages/:id` | Single message |
//! | `GET`  | `/messages/:id/replies` | Replies in creation order |
//! | `POST` | `/messages/:id/react` | Body: [`ReactionBody`]; returns the message |
//! | `POST` | `/messages/:id/unreact` | Body: [`ReactionBody`]; returns the message |
//! | `POST` | `/messages/:id/reply` | Body: a message payload; returns 201 + reply |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use parley_core::{
  Principal,
  event::MessagePayload,
  message::{HISTORY_LIMIT, Message},
  store::ChatStore,
};
use parley_realtime::Hub;
use serde::Deserialize;
use uuid::Uuid;

use crate::{check_actor, error::ApiError};

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  #[serde(default = "default_limit")]
  pub limit: usize,
}

fn default_limit() -> usize { HISTORY_LIMIT }

/// `GET /messages/:user1/:user2[?limit=N]`
pub async fn private_history<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path((user, peer)): Path<(Principal, Principal)>,
  Query(params): Query<HistoryParams>,
  verified: Option<Extension<Principal>>,
) -> Result<Json<Vec<Message>>, ApiError> {
  if let Some(Extension(me)) = &verified
    && me != &user
    && me != &peer
  {
    return Err(ApiError::Forbidden(format!(
      "{me} is not part of this conversation"
    )));
  }
  let messages = hub.private_history(&user, &peer, params.limit).await?;
  Ok(Json(messages))
}

/// `GET /group-messages/:group[?limit=N]`
pub async fn group_history<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(group): Path<String>,
  Query(params): Query<HistoryParams>,
  verified: Option<Extension<Principal>>,
) -> Result<Json<Vec<Message>>, ApiError> {
  if let Some(Extension(me)) = &verified
    && !hub.is_member(&group, me).await?
  {
    return Err(ApiError::Forbidden(format!(
      "{me} is not a member of group {group}"
    )));
  }
  let messages = hub.group_history(&group, params.limit).await?;
  Ok(Json(messages))
}

// ─── Single message / thread ─────────────────────────────────────────────────

/// Load a message, checking that the verified caller (if any) belongs to its
/// conversation.
async fn load<S: ChatStore>(
  hub: &Hub<S>,
  id: Uuid,
  verified: Option<&Extension<Principal>>,
) -> Result<Message, ApiError> {
  let message = match verified {
    Some(Extension(me)) => hub.visible_message(id, me).await?,
    None => hub.message(id).await?,
  };
  Ok(message)
}

/// `GET /messages/:id`
pub async fn get_one<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(id): Path<Uuid>,
  verified: Option<Extension<Principal>>,
) -> Result<Json<Message>, ApiError> {
  Ok(Json(load(&hub, id, verified.as_ref()).await?))
}

/// `GET /messages/:id/replies`
pub async fn replies<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(id): Path<Uuid>,
  verified: Option<Extension<Principal>>,
) -> Result<Json<Vec<Message>>, ApiError> {
  let parent = load(&hub, id, verified.as_ref()).await?;
  Ok(Json(hub.replies(parent.id).await?))
}

/// `POST /messages/:id/reply`: body is a message payload (`from`, `to` or
/// `group`, `text` or `sticker`, ...). Returns 201 + the stored reply.
pub async fn reply<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(id): Path<Uuid>,
  verified: Option<Extension<Principal>>,
  Json(body): Json<MessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
  check_actor(verified.as_ref(), &body.from)?;
  let reply = hub.reply(id, body).await?;
  Ok((StatusCode::CREATED, Json(reply)))
}

// ─── Reactions ───────────────────────────────────────────────────────────────

/// JSON body accepted by the react / unreact endpoints.
#[derive(Debug, Deserialize)]
pub struct ReactionBody {
  pub user:  Principal,
  pub emoji: String,
}

/// `POST /messages/:id/react`
pub async fn react<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(id): Path<Uuid>,
  verified: Option<Extension<Principal>>,
  Json(body): Json<ReactionBody>,
) -> Result<Json<Message>, ApiError> {
  check_actor(verified.as_ref(), &body.user)?;
  let mutated = hub.react(id, &body.user, &body.emoji).await?;
  Ok(Json(mutated.message))
}

/// `POST /messages/:id/unreact`
pub async fn unreact<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Path(id): Path<Uuid>,
  verified: Option<Extension<Principal>>,
  Json(body): Json<ReactionBody>,
) -> Result<Json<Message>, ApiError> {
  check_actor(verified.as_ref(), &body.user)?;
  let mutated = hub.unreact(id, &body.user, &body.emoji).await?;
  Ok(Json(mutated.message))
}
