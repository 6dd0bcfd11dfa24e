//! [`BlueprintSyncContext`]: the client's explicit view of one blueprint.
//!
//! Loaded once from the backend and passed by `&mut` into every orchestrator
//! and rollback call, which fold the bindings the backend returns back into
//! it. Drift is always recomputed from the blueprint held here, never trusted
//! from the wire.

use std::collections::BTreeMap;

use bpsync_core::{
  Result,
  backend::SyncBackend,
  binding::{FactoryBinding, UNBOUND},
  blueprint::Blueprint,
};

#[derive(Debug, Clone)]
pub struct BlueprintSyncContext {
  blueprint: Blueprint,
  /// Keyed by factory id.
  bindings:  BTreeMap<String, FactoryBinding>,
}

impl BlueprintSyncContext {
  /// Fetch the blueprint and its current bindings.
  pub async fn load<B: SyncBackend>(backend: &B, blueprint_id: &str) -> Result<Self> {
    let blueprint = backend.get_blueprint(blueprint_id).await?;
    let bindings = backend.list_bindings(blueprint_id).await?;
    Ok(Self::from_parts(blueprint, bindings))
  }

  pub fn from_parts(blueprint: Blueprint, bindings: impl IntoIterator<Item = FactoryBinding>) -> Self {
    let mut ctx = Self { blueprint, bindings: BTreeMap::new() };
    for binding in bindings {
      ctx.record(binding);
    }
    ctx
  }

  /// Replace everything with a fresh read from the backend.
  pub async fn refresh<B: SyncBackend>(&mut self, backend: &B) -> Result<()> {
    *self = Self::load(backend, &self.blueprint.blueprint_id).await?;
    Ok(())
  }

  pub fn blueprint(&self) -> &Blueprint { &self.blueprint }

  pub fn blueprint_id(&self) -> &str { &self.blueprint.blueprint_id }

  pub fn current_version(&self) -> u32 { self.blueprint.current_version }

  pub fn binding(&self, factory_id: &str) -> Option<&FactoryBinding> {
    self.bindings.get(factory_id)
  }

  /// Ordered by factory id.
  pub fn bindings(&self) -> impl Iterator<Item = &FactoryBinding> { self.bindings.values() }

  /// `0` when the factory is not bound to this blueprint.
  pub fn applied_version(&self, factory_id: &str) -> u32 {
    self
      .binding(factory_id)
      .map_or(UNBOUND, |b| b.applied_version)
  }

  /// Bindings behind the current version of an active blueprint.
  pub fn outdated(&self) -> Vec<&FactoryBinding> {
    self.bindings().filter(|b| b.needs_upgrade).collect()
  }

  pub fn bound_ids(&self) -> Vec<String> { self.bindings.keys().cloned().collect() }

  pub(crate) fn record(&mut self, mut binding: FactoryBinding) {
    binding.needs_upgrade = self.blueprint.needs_upgrade(binding.applied_version);
    self.bindings.insert(binding.factory_id.clone(), binding);
  }

  pub(crate) fn forget(&mut self, factory_id: &str) { self.bindings.remove(factory_id); }
}
