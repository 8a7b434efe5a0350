//! HTTP Basic-auth verification against the configured accounts.
//!
//! The verified username becomes the request's [`Principal`]: the WebSocket
//! handler extracts it with [`Authenticated`], and [`require_principal`]
//! inserts it as a request extension in front of the REST API.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, request::Parts},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use parley_core::{Principal, store::ChatStore};
use serde::Deserialize;
use std::sync::Arc;

use crate::{AppState, error::Error};

/// One set of credentials accepted by this server instance.
#[derive(Clone, Debug, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
  pub accounts: Vec<Account>,
}

/// The caller's verified principal.
pub struct Authenticated(pub Principal);

/// Verify Basic credentials from `headers` and return who they belong to.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Principal, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = config
    .accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Principal::from(username))
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: ChatStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Authenticated)
  }
}

/// Middleware: reject unauthenticated requests, otherwise attach the
/// verified [`Principal`] as an extension for downstream handlers.
pub async fn require_principal(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let principal = verify_auth(req.headers(), &auth)?;
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{Request, header};
  use rand_core::OsRng;

  fn config(accounts: &[(&str, &str)]) -> AuthConfig {
    let accounts = accounts
      .iter()
      .map(|(username, password)| {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
          .hash_password(password.as_bytes(), &salt)
          .unwrap()
          .to_string();
        Account {
          username: username.to_string(),
          password_hash,
        }
      })
      .collect();
    AuthConfig { accounts }
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn headers(value: &str) -> HeaderMap {
    let req = Request::builder()
      .header(header::AUTHORIZATION, value)
      .body(())
      .unwrap();
    req.headers().clone()
  }

  #[test]
  fn each_account_authenticates_as_itself() {
    let cfg = config(&[("alice", "a-secret"), ("bob", "b-secret")]);
    let who = verify_auth(&headers(&basic("bob", "b-secret")), &cfg).unwrap();
    assert_eq!(who, Principal::from("bob"));
  }

  #[test]
  fn wrong_password() {
    let cfg = config(&[("alice", "secret")]);
    let res = verify_auth(&headers(&basic("alice", "wrong")), &cfg);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn password_of_another_account() {
    let cfg = config(&[("alice", "a-secret"), ("bob", "b-secret")]);
    let res = verify_auth(&headers(&basic("alice", "b-secret")), &cfg);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let cfg = config(&[("alice", "secret")]);
    let res = verify_auth(&headers(&basic("mallory", "secret")), &cfg);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let cfg = config(&[("alice", "secret")]);
    let res = verify_auth(&HeaderMap::new(), &cfg);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config(&[("alice", "secret")]);
    let res = verify_auth(&headers("Basic !!!not-base64!!!"), &cfg);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }
}
