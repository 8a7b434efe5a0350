//! HTTP and WebSocket front end for Parley.
//!
//! Ties the REST API and the event channel to one [`Hub`], authenticates
//! callers with HTTP Basic credentials, and owns the server configuration.

pub mod auth;
pub mod error;
pub mod ws;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use parley_core::{Principal, store::ChatStore};
use parley_realtime::{Hub, HubConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{Account, AuthConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub accounts:   Vec<Account>,
  #[serde(default)]
  pub chat:       HubConfig,
}

impl ServerConfig {
  /// Reject account names that cannot be routed, such as the reserved
  /// path segments of the REST API.
  pub fn validate(&self) -> parley_core::Result<()> {
    for account in &self.accounts {
      Principal::from(account.username.as_str()).validate("accounts.username")?;
    }
    Ok(())
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub hub:  Arc<Hub<S>>,
  pub auth: Arc<AuthConfig>,
}

// A derive would demand `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      hub:  self.hub.clone(),
      auth: self.auth.clone(),
    }
  }
}

impl<S: ChatStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let hub = Hub::new(Arc::new(store), config.chat);
    Self {
      hub:  Arc::new(hub),
      auth: Arc::new(AuthConfig {
        accounts: config.accounts,
      }),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: liveness at `/`, the event channel at
/// `/ws`, and the REST API under `/api` behind Basic auth.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ChatStore + 'static,
{
  let api = parley_api::api_router(state.hub.clone()).layer(
    middleware::from_fn_with_state(state.auth.clone(), auth::require_principal),
  );

  Router::new()
    .route("/", get(|| async { "Parley server is running" }))
    .route("/ws", get(ws::handler::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
