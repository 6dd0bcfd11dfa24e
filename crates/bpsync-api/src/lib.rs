//! JSON REST API for blueprint rollout.
//!
//! Exposes an axum [`Router`] backed by any
//! [`bpsync_core::store::BlueprintStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", bpsync_api::api_router(store.clone()))
//! ```

pub mod bindings;
pub mod blueprints;
pub mod error;
pub mod factories;
pub mod versions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use bpsync_core::store::BlueprintStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: BlueprintStore + 'static,
  S::Error: Into<bpsync_core::Error>,
{
  Router::new()
    // Catalog
    .route("/blueprints", get(blueprints::list::<S>).post(blueprints::create::<S>))
    .route(
      "/blueprints/{id}",
      get(blueprints::get_one::<S>).delete(blueprints::delete_one::<S>),
    )
    .route("/blueprints/{id}/transition", post(blueprints::transition::<S>))
    // Version history
    .route(
      "/blueprints/{id}/versions",
      get(versions::list::<S>).post(versions::create::<S>),
    )
    .route("/blueprints/{id}/versions/{version}", get(versions::get_one::<S>))
    .route(
      "/blueprints/{id}/versions/{version}/publish",
      post(versions::publish::<S>),
    )
    .route("/blueprints/{id}/compare", get(versions::compare::<S>))
    // Bindings
    .route("/blueprints/{id}/bindings", get(bindings::list::<S>))
    .route(
      "/blueprints/{id}/bindings/{factory_id}/notified",
      post(bindings::mark_notified::<S>),
    )
    // Factories
    .route("/factories", get(factories::list::<S>).post(factories::create::<S>))
    .route("/factories/{id}/upgrade", post(bindings::upgrade::<S>))
    .route("/factories/{id}/rollback", post(bindings::rollback::<S>))
    .route("/factories/{id}/events", get(factories::events::<S>))
    .with_state(store)
}
