//! [`RollbackController`]: reverts a single factory's binding.

use bpsync_core::{
  Result,
  binding::BindingState,
  sync::{RollbackOutcome, RollbackRequest},
};

use crate::{context::BlueprintSyncContext, queue::MutationQueue};

/// Rolls one factory back to an earlier version, or unbinds it with `0`.
///
/// Unlike a batch apply, errors propagate directly to the caller.
#[derive(Clone)]
pub struct RollbackController {
  queue: MutationQueue,
}

impl RollbackController {
  pub fn new(queue: MutationQueue) -> Self { Self { queue } }

  pub async fn rollback(
    &self,
    ctx: &mut BlueprintSyncContext,
    factory_id: &str,
    target_version: u32,
    reason: &str,
  ) -> Result<RollbackOutcome> {
    // Rejects forward targets without a round trip.
    BindingState::of(ctx.binding(factory_id)).rollback(target_version)?;

    let request =
      RollbackRequest::new(target_version, reason).for_blueprint(ctx.blueprint_id());
    let outcome = self.queue.rollback(factory_id, request).await?;

    match &outcome.binding {
      Some(binding) => ctx.record(binding.clone()),
      None => ctx.forget(factory_id),
    }
    tracing::info!(
      %factory_id,
      blueprint_id = ctx.blueprint_id(),
      target_version,
      summary = %outcome.summary,
      "factory rolled back"
    );
    Ok(outcome)
  }
}
