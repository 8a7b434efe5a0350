//! JSON REST API for Parley.
//!
//! Exposes an axum [`Router`] backed by a [`Hub`]. Mutating endpoints go
//! through the same hub operations as the event channel, so a reaction
//! posted over HTTP is broadcast exactly like one sent over a socket.
//! Authentication is the caller's responsibility: when the router is
//! mounted behind a layer that inserts the verified [`Principal`] as a
//! request extension, every endpoint that names a principal must name that
//! one.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", parley_api::api_router(hub.clone()))
//! ```
//!
//! [`Principal`]: parley_core::Principal

pub mod error;
pub mod groups;
pub mod messages;
pub mod presence;

use std::sync::Arc;

use axum::{
  Extension, Router,
  routing::{get, post},
};
use parley_core::{Principal, store::ChatStore};
use parley_realtime::Hub;

pub use error::ApiError;

/// Build the API router for `hub`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(hub: Arc<Hub<S>>) -> Router<()>
where
  S: ChatStore + 'static,
{
  // The first segment under /messages is a principal or a message id
  // depending on the route; matchit needs one parameter name for it. The
  // fixed second segments win over `{peer}`, so they are reserved names
  // (`parley_core::scope::RESERVED_NAMES`).
  Router::new()
    // Messages
    .route("/messages/{key}", get(messages::get_one::<S>))
    .route("/messages/{key}/{peer}", get(messages::private_history::<S>))
    .route("/messages/{key}/replies", get(messages::replies::<S>))
    .route("/messages/{key}/react", post(messages::react::<S>))
    .route("/messages/{key}/unreact", post(messages::unreact::<S>))
    .route("/messages/{key}/reply", post(messages::reply::<S>))
    .route("/group-messages/{group}", get(messages::group_history::<S>))
    // Presence
    .route("/online-users", get(presence::online_users::<S>))
    // Groups
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/groups/join", post(groups::join::<S>))
    .with_state(hub)
}

/// Reject a request that names someone other than the verified caller.
/// Without an auth layer there is nothing to compare against.
pub(crate) fn check_actor(
  verified: Option<&Extension<Principal>>,
  claimed: &Principal,
) -> Result<(), ApiError> {
  match verified {
    Some(Extension(me)) if me != claimed => Err(ApiError::Forbidden(format!(
      "authenticated as {me}, cannot act as {claimed}"
    ))),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests;
