//! Handlers for `/factories` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/factories` | Optional `?exclude=F1&exclude=F2` |
//! | `POST` | `/factories` | Body: `{"factory_id":"F1","name":"..."}`; returns 201 |
//! | `GET`  | `/factories/:id/events` | Binding history, newest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bpsync_core::{
  Error as CoreError,
  binding::BindingEvent,
  factory::{Factory, NewFactory},
  store::BlueprintStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// Every `exclude` value, verbatim. Ids may contain commas or spaces, so each
/// one travels as its own parameter.
fn excluded(params: Vec<(String, String)>) -> Vec<String> {
  params
    .into_iter()
    .filter(|(key, _)| key == "exclude")
    .map(|(_, id)| id)
    .collect()
}

/// `GET /factories[?exclude=<id>&exclude=<id>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Factory>>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let excluded = excluded(params);
  let factories = if excluded.is_empty() {
    store.list_factories().await
  } else {
    store.list_factories_excluding(&excluded).await
  }
  .map_err(ApiError::store)?;
  Ok(Json(factories))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub factory_id:    Option<String>,
  pub name:          String,
  pub industry_type: Option<String>,
}

impl From<CreateBody> for NewFactory {
  fn from(b: CreateBody) -> Self {
    NewFactory {
      factory_id:    b.factory_id,
      name:          b.name,
      industry_type: b.industry_type,
    }
  }
}

/// `POST /factories`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let factory = store
    .add_factory(NewFactory::from(body))
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(factory)))
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// `GET /factories/:id/events`
pub async fn events<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<BindingEvent>>, ApiError>
where
  S: BlueprintStore,
  S::Error: Into<CoreError>,
{
  let events = store
    .list_binding_events(&id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}
