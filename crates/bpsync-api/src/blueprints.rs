//! Handlers for `/blueprints` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/blueprints` | Optional `?status=draft\|active\|inactive` |
//! | `POST`   | `/blueprints` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/blueprints/:id` | 404 if not found |
//! | `DELETE` | `/blueprints/:id` | 409 while any factory is bound |
//! | `POST`   | `/blueprints/:id/transition` | Body: `{"action":"publish"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bpsync_core::{
  Error as CoreError,
  blueprint::{Blueprint, BlueprintStatus, NewBlueprint, StatusAction},
  store::BlueprintStore,
  version::ConfigSnapshot,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<BlueprintStatus>,
}

/// `GET /blueprints[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Blueprint>>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let blueprints = store
    .list_blueprints(params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(blueprints))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub blueprint_id:  Option<String>,
  pub name:          String,
  pub industry_type: String,
  pub description:   Option<String>,
  /// Configuration for version 1. Defaults to an empty snapshot.
  #[serde(default)]
  pub config:        ConfigSnapshot,
}

impl From<CreateBody> for NewBlueprint {
  fn from(b: CreateBody) -> Self {
    NewBlueprint {
      blueprint_id:  b.blueprint_id,
      name:          b.name,
      industry_type: b.industry_type,
      description:   b.description,
      config:        b.config,
    }
  }
}

/// `POST /blueprints`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("blueprint name must not be empty".into()));
  }
  let blueprint = store
    .create_blueprint(NewBlueprint::from(body))
    .await
    .map_err(ApiError::store)?;
  tracing::info!(blueprint_id = %blueprint.blueprint_id, "blueprint created");
  Ok((StatusCode::CREATED, Json(blueprint)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /blueprints/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Blueprint>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let blueprint = store
    .get_blueprint(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::BlueprintNotFound(id))?;
  Ok(Json(blueprint))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /blueprints/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  store.delete_blueprint(&id).await.map_err(ApiError::store)?;
  tracing::info!(blueprint_id = %id, "blueprint deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Transition ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub action: StatusAction,
}

/// `POST /blueprints/:id/transition`
pub async fn transition<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Blueprint>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let blueprint = store
    .transition_blueprint(&id, body.action)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    blueprint_id = %id,
    action = %body.action,
    status = %blueprint.status,
    "blueprint status changed"
  );
  Ok(Json(blueprint))
}
