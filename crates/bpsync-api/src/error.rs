//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"error": "<message>", "kind": "<kind>"}`,
//! where `kind` is the serialised [`ErrorKind`]. Clients rebuild the domain
//! error from that pair.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use bpsync_core::{Error as CoreError, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Malformed request parameters that never reached the store.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Domain(#[from] CoreError),
}

impl ApiError {
  /// Convert any store error into its domain form.
  pub fn store<E: Into<CoreError>>(e: E) -> Self { Self::Domain(e.into()) }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::BadRequest(_) => ErrorKind::Validation,
      Self::Domain(e) => e.kind(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self.kind() {
      ErrorKind::Validation => StatusCode::BAD_REQUEST,
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::Conflict => StatusCode::CONFLICT,
      ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
      ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::debug!(error = %self, %status, "request rejected");
    }
    let body = json!({ "error": self.to_string(), "kind": self.kind() });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_follows_error_kind() {
    let cases = [
      (CoreError::validation("x"), StatusCode::BAD_REQUEST),
      (CoreError::FactoryNotFound("F1".into()), StatusCode::NOT_FOUND),
      (CoreError::Conflict("x".into()), StatusCode::CONFLICT),
      (CoreError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
      (CoreError::Backend("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).status(), status);
    }
    assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
  }
}
