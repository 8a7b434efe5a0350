//! Error types for `parley-core`.
//!
//! The variants follow the request-level taxonomy every layer reports in:
//! validation failures, unknown ids, duplicates and persistence failures.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid request: {0}")]
  Validation(String),

  #[error("{principal} is not a member of group {group}")]
  NotAMember { group: String, principal: String },

  #[error("{principal} is not a participant of {scope}")]
  NotAParticipant { scope: String, principal: String },

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("group not found: {0}")]
  GroupNotFound(String),

  #[error("group already exists: {0}")]
  GroupExists(String),

  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a storage backend error.
  pub fn persistence<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(err))
  }

  /// Stable machine-readable class, sent to clients alongside the message.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_)
      | Self::NotAMember { .. }
      | Self::NotAParticipant { .. } => "validation",
      Self::MessageNotFound(_) | Self::GroupNotFound(_) => "not_found",
      Self::GroupExists(_) => "duplicate",
      Self::Persistence(_) => "persistence",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
