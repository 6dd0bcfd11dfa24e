//! The `BlueprintStore` trait: the server side of blueprint rollout.
//!
//! The trait is implemented by storage backends (e.g. `bpsync-store-sqlite`).
//! Higher layers (`bpsync-api`, the in-process client adapter) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  binding::{BindingEvent, FactoryBinding},
  blueprint::{Blueprint, BlueprintStatus, NewBlueprint, StatusAction},
  diff::VersionCompareResult,
  factory::{Factory, NewFactory},
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::{BlueprintVersion, NewVersion},
};

/// Abstraction over a blueprint store backend.
///
/// Versions and binding events are append-only. Version numbers are assigned
/// by the store under mutual exclusion per blueprint.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait BlueprintStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// Create a `draft` blueprint together with its version 1.
  fn create_blueprint(
    &self,
    input: NewBlueprint,
  ) -> impl Future<Output = Result<Blueprint, Self::Error>> + Send;

  /// Retrieve a blueprint by id. Returns `None` if not found.
  fn get_blueprint(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Option<Blueprint>, Self::Error>> + Send;

  /// List all blueprints, optionally filtered by status.
  fn list_blueprints(
    &self,
    status: Option<BlueprintStatus>,
  ) -> impl Future<Output = Result<Vec<Blueprint>, Self::Error>> + Send;

  /// Move a blueprint through its status lifecycle.
  fn transition_blueprint(
    &self,
    blueprint_id: &str,
    action: StatusAction,
  ) -> impl Future<Output = Result<Blueprint, Self::Error>> + Send;

  /// Delete a blueprint and its history. Fails with a conflict while any
  /// factory is bound to it.
  fn delete_blueprint(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  // ── Version history ───────────────────────────────────────────────────

  /// Append a version numbered `max + 1` and advance `current_version`.
  fn create_version(
    &self,
    blueprint_id: &str,
    input: NewVersion,
  ) -> impl Future<Output = Result<BlueprintVersion, Self::Error>> + Send;

  fn get_version(
    &self,
    blueprint_id: &str,
    version: u32,
  ) -> impl Future<Output = Result<Option<BlueprintVersion>, Self::Error>> + Send;

  /// Full history, newest first.
  fn list_versions(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Vec<BlueprintVersion>, Self::Error>> + Send;

  /// Mark a version published. Existing bindings are not touched.
  fn publish_version(
    &self,
    blueprint_id: &str,
    version: u32,
  ) -> impl Future<Output = Result<BlueprintVersion, Self::Error>> + Send;

  /// Field-level difference from `from` to `to`, in either order.
  fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> impl Future<Output = Result<VersionCompareResult, Self::Error>> + Send;

  // ── Factories ─────────────────────────────────────────────────────────

  fn add_factory(
    &self,
    input: NewFactory,
  ) -> impl Future<Output = Result<Factory, Self::Error>> + Send;

  fn list_factories(
    &self,
  ) -> impl Future<Output = Result<Vec<Factory>, Self::Error>> + Send;

  /// All factories whose id is not in `excluded`.
  fn list_factories_excluding(
    &self,
    excluded: &[String],
  ) -> impl Future<Output = Result<Vec<Factory>, Self::Error>> + Send;

  // ── Bindings ──────────────────────────────────────────────────────────

  /// Current bindings of a blueprint with `needs_upgrade` computed at read.
  fn list_bindings(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Vec<FactoryBinding>, Self::Error>> + Send;

  /// Apply `request.target_version` to one factory. Idempotent for a retried
  /// request whose target is already applied.
  fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> impl Future<Output = Result<BindingResult, Self::Error>> + Send;

  /// Roll a factory's binding back; target `0` unbinds. Leaves the binding
  /// untouched on any error.
  fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> impl Future<Output = Result<RollbackOutcome, Self::Error>> + Send;

  /// Record that the admin notification for a binding went out.
  fn mark_notified(
    &self,
    blueprint_id: &str,
    factory_id: &str,
  ) -> impl Future<Output = Result<FactoryBinding, Self::Error>> + Send;

  /// Binding transitions of a factory, newest first.
  fn list_binding_events(
    &self,
    factory_id: &str,
  ) -> impl Future<Output = Result<Vec<BindingEvent>, Self::Error>> + Send;
}
