//! [`LocalBackend`]: drives a [`BlueprintStore`] in-process.

use std::sync::Arc;

use bpsync_core::{
  Error, Result,
  backend::SyncBackend,
  binding::FactoryBinding,
  blueprint::Blueprint,
  diff::VersionCompareResult,
  factory::Factory,
  store::BlueprintStore,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::BlueprintVersion,
};

/// Exposes any store as a [`SyncBackend`], so the orchestrator can run
/// against an embedded database without an HTTP hop.
pub struct LocalBackend<S> {
  store: Arc<S>,
}

impl<S> LocalBackend<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }
}

impl<S> Clone for LocalBackend<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

fn domain<T, E: Into<Error>>(result: std::result::Result<T, E>) -> Result<T> {
  result.map_err(Into::into)
}

impl<S> SyncBackend for LocalBackend<S>
where
  S: BlueprintStore,
  S::Error: Into<Error>,
{
  async fn get_blueprint(&self, blueprint_id: &str) -> Result<Blueprint> {
    domain(self.store.get_blueprint(blueprint_id).await)?
      .ok_or_else(|| Error::BlueprintNotFound(blueprint_id.to_owned()))
  }

  async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
    domain(self.store.list_versions(blueprint_id).await)
  }

  async fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> Result<VersionCompareResult> {
    domain(self.store.compare_versions(blueprint_id, from, to).await)
  }

  async fn list_bindings(&self, blueprint_id: &str) -> Result<Vec<FactoryBinding>> {
    domain(self.store.list_bindings(blueprint_id).await)
  }

  async fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> Result<BindingResult> {
    domain(self.store.upgrade_factory(factory_id, request).await)
  }

  async fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> Result<RollbackOutcome> {
    domain(self.store.rollback_factory(factory_id, request).await)
  }

  async fn list_factories(&self) -> Result<Vec<Factory>> {
    domain(self.store.list_factories().await)
  }

  async fn list_factories_excluding(&self, excluded: &[String]) -> Result<Vec<Factory>> {
    domain(self.store.list_factories_excluding(excluded).await)
  }
}
