//! [`Orchestrator`]: applies a blueprint version to a batch of factories.
//!
//! Factories are processed strictly in the order given, one upgrade at a
//! time through the [`MutationQueue`]. A failure is attributed to its factory
//! and the loop moves on; every factory in the batch is attempted and
//! nothing already applied is undone. The result is a per-factory report
//! plus a success count rather than a single pass/fail.

use std::{collections::HashSet, sync::Arc};

use bpsync_core::{
  Error, ErrorKind, Result,
  backend::SyncBackend,
  binding::FactoryBinding,
  sync::{BindingResult, SyncOptions, UpgradeRequest},
};
use serde::Serialize;

use crate::{
  context::BlueprintSyncContext,
  queue::{MutationQueue, SyncConfig},
  rollback::RollbackController,
};

// ─── Progress ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  /// The factory's upgrade call is outstanding.
  Dispatched,
  Completed,
}

/// Reported twice per factory: at dispatch with `(i + 0.5) / total`, and on
/// completion with `(i + 1) / total`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
  pub factory_id: String,
  pub phase:      Phase,
  /// Factories finished so far, including this one once completed.
  pub completed:  usize,
  pub total:      usize,
  pub fraction:   f64,
}

impl Progress {
  fn dispatched(index: usize, total: usize, factory_id: &str) -> Self {
    Self {
      factory_id: factory_id.to_owned(),
      phase: Phase::Dispatched,
      completed: index,
      total,
      fraction: (index as f64 + 0.5) / total as f64,
    }
  }

  fn completed(index: usize, total: usize, factory_id: &str) -> Self {
    Self {
      factory_id: factory_id.to_owned(),
      phase: Phase::Completed,
      completed: index + 1,
      total,
      fraction: (index + 1) as f64 / total as f64,
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
  Applied {
    binding: FactoryBinding,
    /// `false` when the factory was already at the target.
    changed: bool,
  },
  Failed {
    kind:    ErrorKind,
    message: String,
  },
}

impl Outcome {
  pub fn is_success(&self) -> bool { matches!(self, Self::Applied { .. }) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactoryOutcome {
  pub factory_id: String,
  #[serde(flatten)]
  pub outcome:    Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
  pub blueprint_id:   String,
  pub target_version: u32,
  pub success_count:  usize,
  pub total_count:    usize,
  /// One entry per factory, in processing order.
  pub outcomes:       Vec<FactoryOutcome>,
}

impl ApplyReport {
  fn empty(blueprint_id: &str, target_version: u32) -> Self {
    Self {
      blueprint_id: blueprint_id.to_owned(),
      target_version,
      success_count: 0,
      total_count: 0,
      outcomes: Vec::new(),
    }
  }

  pub fn all_succeeded(&self) -> bool { self.success_count == self.total_count }

  pub fn failures(&self) -> impl Iterator<Item = &FactoryOutcome> {
    self.outcomes.iter().filter(|o| !o.outcome.is_success())
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator<B> {
  backend: Arc<B>,
  queue:   MutationQueue,
}

impl<B> Orchestrator<B>
where
  B: SyncBackend + 'static,
{
  /// Spawns the mutation worker; must be called inside a tokio runtime.
  pub fn new(backend: Arc<B>, config: &SyncConfig) -> Self {
    let queue = MutationQueue::spawn(Arc::clone(&backend), config);
    Self { backend, queue }
  }

  pub fn backend(&self) -> &B { &self.backend }

  pub async fn load_context(&self, blueprint_id: &str) -> Result<BlueprintSyncContext> {
    BlueprintSyncContext::load(self.backend.as_ref(), blueprint_id).await
  }

  /// A rollback controller sharing this orchestrator's mutation worker.
  pub fn rollback_controller(&self) -> RollbackController {
    RollbackController::new(self.queue.clone())
  }

  /// Apply `target_version` of the context's blueprint to `factory_ids`.
  ///
  /// Caller errors (no factories, no components) are returned before any
  /// call is made. A target beyond the context's current version triggers a
  /// refresh and then fails as not found when it is still unknown. After that the call always succeeds
  /// with a report; per-factory failures live inside it.
  pub async fn apply_blueprint(
    &self,
    ctx: &mut BlueprintSyncContext,
    target_version: u32,
    factory_ids: &[String],
    options: SyncOptions,
    mut progress: impl FnMut(Progress),
  ) -> Result<ApplyReport> {
    if factory_ids.is_empty() {
      return Err(Error::validation("select at least one factory"));
    }
    options.validate()?;
    if target_version == 0 {
      return Err(Error::validation(
        "target version must be at least 1; roll back to 0 to unbind",
      ));
    }
    if target_version > ctx.current_version() {
      // The context may predate the version; only a fresh read can say it is missing.
      ctx.refresh(self.backend.as_ref()).await?;
      if target_version > ctx.current_version() {
        return Err(Error::VersionNotFound {
          blueprint_id: ctx.blueprint_id().to_owned(),
          version:      target_version,
        });
      }
    }

    let mut seen = HashSet::new();
    let factories: Vec<&String> = factory_ids.iter().filter(|id| seen.insert(*id)).collect();
    let total = factories.len();
    let mut report = ApplyReport::empty(ctx.blueprint_id(), target_version);
    report.total_count = total;

    tracing::info!(
      blueprint_id = ctx.blueprint_id(),
      target_version,
      factories = total,
      "applying blueprint"
    );

    for (index, factory_id) in factories.into_iter().enumerate() {
      progress(Progress::dispatched(index, total, factory_id));

      let result = self.apply_one(ctx, factory_id, target_version, &options).await;
      let outcome = match result {
        Ok(BindingResult { binding, changed }) => {
          tracing::info!(
            %factory_id,
            blueprint_id = ctx.blueprint_id(),
            applied_version = binding.applied_version,
            changed,
            "factory applied"
          );
          ctx.record(binding.clone());
          report.success_count += 1;
          Outcome::Applied { binding, changed }
        }
        Err(e) => {
          tracing::warn!(
            %factory_id,
            blueprint_id = ctx.blueprint_id(),
            target_version,
            error = %e,
            "factory apply failed"
          );
          Outcome::Failed { kind: e.kind(), message: e.to_string() }
        }
      };
      report.outcomes.push(FactoryOutcome { factory_id: factory_id.clone(), outcome });

      progress(Progress::completed(index, total, factory_id));
    }

    tracing::info!(
      blueprint_id = ctx.blueprint_id(),
      success = report.success_count,
      total = report.total_count,
      "apply finished"
    );
    Ok(report)
  }

  async fn apply_one(
    &self,
    ctx: &BlueprintSyncContext,
    factory_id: &str,
    target_version: u32,
    options: &SyncOptions,
  ) -> Result<BindingResult> {
    let applied = ctx.applied_version(factory_id);
    if applied > target_version {
      return Err(Error::validation(format!(
        "factory {factory_id} is at version {applied}; use rollback to go back to \
         {target_version}"
      )));
    }

    let request = UpgradeRequest {
      blueprint_id: ctx.blueprint_id().to_owned(),
      target_version,
      expected_version: Some(applied),
      sync_options: options.clone(),
    };
    self.queue.upgrade(factory_id, request).await
  }

  /// Bring every outdated binding up to the blueprint's current version with
  /// all components. The context is refreshed first; nothing outdated yields
  /// an empty report.
  pub async fn batch_sync(
    &self,
    ctx: &mut BlueprintSyncContext,
    progress: impl FnMut(Progress),
  ) -> Result<ApplyReport> {
    ctx.refresh(self.backend.as_ref()).await?;

    let outdated: Vec<String> = ctx
      .outdated()
      .into_iter()
      .map(|b| b.factory_id.clone())
      .collect();
    let target = ctx.current_version();
    if outdated.is_empty() {
      tracing::info!(blueprint_id = ctx.blueprint_id(), "no outdated factories");
      return Ok(ApplyReport::empty(ctx.blueprint_id(), target));
    }

    self
      .apply_blueprint(ctx, target, &outdated, SyncOptions::all_components(), progress)
      .await
  }
}
