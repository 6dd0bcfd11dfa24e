//! Handlers for factory bindings and the per-factory sync primitives.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/blueprints/:id/bindings` | Current bindings with drift flag |
//! | `POST` | `/blueprints/:id/bindings/:factory/notified` | `PENDING` → `SENT` |
//! | `POST` | `/factories/:id/upgrade` | Body: [`UpgradeRequest`]; safe to retry |
//! | `POST` | `/factories/:id/rollback` | Body: [`RollbackRequest`]; `0` unbinds |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use bpsync_core::{
  Error as CoreError,
  binding::FactoryBinding,
  store::BlueprintStore,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /blueprints/:id/bindings`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<FactoryBinding>>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let bindings = store.list_bindings(&id).await.map_err(ApiError::store)?;
  Ok(Json(bindings))
}

// ─── Notification ─────────────────────────────────────────────────────────────

/// `POST /blueprints/:id/bindings/:factory/notified`
pub async fn mark_notified<S>(
  State(store): State<Arc<S>>,
  Path((blueprint_id, factory_id)): Path<(String, String)>,
) -> Result<Json<FactoryBinding>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let binding = store
    .mark_notified(&blueprint_id, &factory_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(binding))
}

// ─── Upgrade ──────────────────────────────────────────────────────────────────

/// `POST /factories/:id/upgrade`
pub async fn upgrade<S>(
  State(store): State<Arc<S>>,
  Path(factory_id): Path<String>,
  Json(request): Json<UpgradeRequest>,
) -> Result<Json<BindingResult>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let blueprint_id = request.blueprint_id.clone();
  let target = request.target_version;
  let result = store
    .upgrade_factory(&factory_id, request)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    %factory_id,
    %blueprint_id,
    target_version = target,
    changed = result.changed,
    "factory upgraded"
  );
  Ok(Json(result))
}

// ─── Rollback ─────────────────────────────────────────────────────────────────

/// `POST /factories/:id/rollback`
pub async fn rollback<S>(
  State(store): State<Arc<S>>,
  Path(factory_id): Path<String>,
  Json(request): Json<RollbackRequest>,
) -> Result<Json<RollbackOutcome>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let outcome = store
    .rollback_factory(&factory_id, request)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(%factory_id, summary = %outcome.summary, "factory rolled back");
  Ok(Json(outcome))
}
