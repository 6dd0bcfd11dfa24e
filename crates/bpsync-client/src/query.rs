//! Read-only helpers built from the backend's query operations.

use bpsync_core::{
  Result, backend::SyncBackend, diff::VersionCompareResult, factory::Factory,
  version::BlueprintVersion,
};

/// Factories that may take `blueprint_id`: not bound to it, and not bound to
/// any other blueprint either.
pub async fn available_factories<B: SyncBackend>(
  backend: &B,
  blueprint_id: &str,
) -> Result<Vec<Factory>> {
  let bound: Vec<String> = backend
    .list_bindings(blueprint_id)
    .await?
    .into_iter()
    .map(|b| b.factory_id)
    .collect();
  let mut factories = backend.list_factories_excluding(&bound).await?;
  factories.retain(Factory::can_bind);
  Ok(factories)
}

/// Newest first.
pub async fn version_history<B: SyncBackend>(
  backend: &B,
  blueprint_id: &str,
) -> Result<Vec<BlueprintVersion>> {
  backend.list_versions(blueprint_id).await
}

/// Directional: fields only in `to` are added, fields only in `from` are
/// removed.
pub async fn compare_versions<B: SyncBackend>(
  backend: &B,
  blueprint_id: &str,
  from: u32,
  to: u32,
) -> Result<VersionCompareResult> {
  backend.compare_versions(blueprint_id, from, to).await
}
