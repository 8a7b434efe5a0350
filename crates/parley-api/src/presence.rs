//! `GET /online-users`: the current presence snapshot.

use std::sync::Arc;

use axum::{Json, extract::State};
use parley_core::{Principal, store::ChatStore};
use parley_realtime::Hub;

/// Sorted list of online principals.
pub async fn online_users<S: ChatStore>(
  State(hub): State<Arc<Hub<S>>>,
) -> Json<Vec<Principal>> {
  Json(hub.presence().snapshot().await)
}
