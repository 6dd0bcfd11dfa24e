//! The `SyncBackend` trait: the remote operations a rollout client consumes.
//!
//! This is the client's view of the platform: a handful of idempotent
//! request/response calls, independent of transport. Implementations exist
//! for HTTP and for an in-process [`crate::store::BlueprintStore`].

use std::future::Future;

use crate::{
  Result,
  binding::FactoryBinding,
  blueprint::Blueprint,
  diff::VersionCompareResult,
  factory::Factory,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::BlueprintVersion,
};

pub trait SyncBackend: Send + Sync {
  fn get_blueprint(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Blueprint>> + Send;

  /// Newest first.
  fn list_versions(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Vec<BlueprintVersion>>> + Send;

  fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> impl Future<Output = Result<VersionCompareResult>> + Send;

  fn list_bindings(
    &self,
    blueprint_id: &str,
  ) -> impl Future<Output = Result<Vec<FactoryBinding>>> + Send;

  /// Must be safe to retry with the same target version.
  fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> impl Future<Output = Result<BindingResult>> + Send;

  fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> impl Future<Output = Result<RollbackOutcome>> + Send;

  fn list_factories(&self) -> impl Future<Output = Result<Vec<Factory>>> + Send;

  fn list_factories_excluding(
    &self,
    excluded: &[String],
  ) -> impl Future<Output = Result<Vec<Factory>>> + Send;
}
