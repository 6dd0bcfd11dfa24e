//! Error type for `bpsync-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule rejected the operation (not found, conflict, ...).
  #[error(transparent)]
  Core(#[from] bpsync_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),
}

impl Error {
  /// The domain error carried by this error, if any.
  pub fn as_core(&self) -> Option<&bpsync_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Domain errors pass through untouched; storage failures become opaque
/// backend errors.
impl From<Error> for bpsync_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => bpsync_core::Error::Backend(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
