//! Error type for `parley-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt row: {0}")]
  Corrupt(String),
}

impl From<Error> for tokio_rusqlite::Error {
  /// Lets decoding failures inside a `Connection::call` closure use `?`.
  fn from(e: Error) -> Self { tokio_rusqlite::Error::Other(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
