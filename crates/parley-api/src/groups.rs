//! Handlers for the group directory.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/groups` | `?username` restricts to that member's groups |
//! | `POST` | `/groups` | Body: [`CreateGroupBody`]; 201, or 409 if the name is taken |
//! | `POST` | `/groups/join` | Body: [`JoinGroupBody`]; idempotent |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use parley_core::{
  Principal,
  group::{Group, NewGroup},
  store::ChatStore,
};
use parley_realtime::Hub;
use serde::Deserialize;

use crate::{check_actor, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub username: Option<Principal>,
}

/// `GET /groups[?username=...]`
pub async fn list<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Group>>, ApiError> {
  let groups = hub.groups(params.username.as_ref()).await?;
  Ok(Json(groups))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
  pub name:   String,
  pub admin:  Principal,
  pub avatar: Option<String>,
}

/// `POST /groups`
pub async fn create<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  verified: Option<Extension<Principal>>,
  Json(body): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, ApiError> {
  check_actor(verified.as_ref(), &body.admin)?;
  let mut input = NewGroup::new(body.name, body.admin);
  input.avatar = body.avatar;
  let group = hub.create_group(input).await?;
  Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupBody {
  pub name:     String,
  pub username: Principal,
}

/// `POST /groups/join`
pub async fn join<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
  verified: Option<Extension<Principal>>,
  Json(body): Json<JoinGroupBody>,
) -> Result<Json<Group>, ApiError> {
  check_actor(verified.as_ref(), &body.username)?;
  let group = hub.add_member(&body.name, &body.username).await?;
  Ok(Json(group))
}
