//! Handlers for a blueprint's version history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/blueprints/:id/versions` | Newest first |
//! | `POST` | `/blueprints/:id/versions` | Body: [`CreateBody`]; returns 201 |
//! | `GET`  | `/blueprints/:id/versions/:version` | 404 if not found |
//! | `POST` | `/blueprints/:id/versions/:version/publish` | Idempotent |
//! | `GET`  | `/blueprints/:id/compare` | `?from=<v>&to=<v>`, both required |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bpsync_core::{
  Error as CoreError,
  diff::VersionCompareResult,
  store::BlueprintStore,
  version::{BlueprintVersion, ChangeType, ConfigSnapshot, NewVersion},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /blueprints/:id/versions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<BlueprintVersion>>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let versions = store.list_versions(&id).await.map_err(ApiError::store)?;
  Ok(Json(versions))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  /// Defaults to `UPDATE`.
  pub change_type:        Option<ChangeType>,
  pub change_description: String,
  /// Omit to carry the previous version's configuration forward.
  pub config:             Option<ConfigSnapshot>,
}

impl From<CreateBody> for NewVersion {
  fn from(b: CreateBody) -> Self {
    NewVersion {
      change_type:        b.change_type.unwrap_or(ChangeType::Update),
      change_description: b.change_description,
      config:             b.config,
    }
  }
}

/// `POST /blueprints/:id/versions`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let version = store
    .create_version(&id, NewVersion::from(body))
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    blueprint_id = %id,
    version = version.version,
    change_type = version.change_type.as_str(),
    "version recorded"
  );
  Ok((StatusCode::CREATED, Json(version)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /blueprints/:id/versions/:version`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(String, u32)>,
) -> Result<Json<BlueprintVersion>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let found = store
    .get_version(&id, version)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::VersionNotFound { blueprint_id: id, version })?;
  Ok(Json(found))
}

// ─── Publish ──────────────────────────────────────────────────────────────────

/// `POST /blueprints/:id/versions/:version/publish`
pub async fn publish<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(String, u32)>,
) -> Result<Json<BlueprintVersion>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let published = store
    .publish_version(&id, version)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(published))
}

// ─── Compare ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompareParams {
  pub from: u32,
  pub to:   u32,
}

/// `GET /blueprints/:id/compare?from=<v>&to=<v>`
pub async fn compare<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  Query(params): Query<CompareParams>,
) -> Result<Json<VersionCompareResult>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let result = store
    .compare_versions(&id, params.from, params.to)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(result))
}
