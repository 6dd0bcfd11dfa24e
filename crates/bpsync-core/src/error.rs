//! Error types for `bpsync-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blueprint::{BlueprintStatus, StatusAction};

/// The coarse category of an [`Error`]. Travels alongside the message in API
/// error bodies so a client can rebuild the same category remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Caller-correctable input; never worth retrying unchanged.
  Validation,
  NotFound,
  /// Concurrent mutation of the same binding.
  Conflict,
  /// Network failure or timeout on an individual call.
  Transient,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("cannot {action} a blueprint that is {from}")]
  InvalidTransition {
    from:   BlueprintStatus,
    action: StatusAction,
  },

  #[error("blueprint not found: {0}")]
  BlueprintNotFound(String),

  #[error("version {version} of blueprint {blueprint_id} not found")]
  VersionNotFound { blueprint_id: String, version: u32 },

  #[error("factory not found: {0}")]
  FactoryNotFound(String),

  /// A not-found reported by a remote backend, where only the message
  /// survives the wire.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("transient failure: {0}")]
  Transient(String),

  #[error("backend error: {0}")]
  Backend(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) | Self::InvalidTransition { .. } => ErrorKind::Validation,
      Self::BlueprintNotFound(_)
      | Self::VersionNotFound { .. }
      | Self::FactoryNotFound(_)
      | Self::NotFound(_) => ErrorKind::NotFound,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::Transient(_) => ErrorKind::Transient,
      Self::Backend(_) | Self::Serialization(_) => ErrorKind::Internal,
    }
  }

  /// Rebuild an error received from a remote backend.
  pub fn remote(kind: ErrorKind, message: impl Into<String>) -> Self {
    let message = message.into();
    match kind {
      ErrorKind::Validation => Self::Validation(message),
      ErrorKind::NotFound => Self::NotFound(message),
      ErrorKind::Conflict => Self::Conflict(message),
      ErrorKind::Transient => Self::Transient(message),
      ErrorKind::Internal => Self::Backend(message),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
