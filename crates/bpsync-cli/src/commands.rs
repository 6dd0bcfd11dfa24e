//! One handler per subcommand.

use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use bpsync_client::{
  ApiClient, ApplyReport, BlueprintSyncContext, Orchestrator, Phase, Progress, SyncConfig, query,
};
use bpsync_core::sync::{Component, SyncOptions};

use crate::{Command, output::Output};

pub async fn run(
  command: Command,
  client: Arc<ApiClient>,
  sync: SyncConfig,
  out: Output,
) -> Result<ExitCode> {
  match command {
    Command::Blueprints { status } => {
      let blueprints = client
        .list_blueprints(status.map(Into::into))
        .await
        .context("listing blueprints")?;
      out.blueprints(&blueprints)?;
    }

    Command::Versions { blueprint } => {
      let versions = query::version_history(client.as_ref(), &blueprint)
        .await
        .with_context(|| format!("loading versions of {blueprint}"))?;
      out.versions(&versions)?;
    }

    Command::Bindings { blueprint } => {
      let ctx = BlueprintSyncContext::load(client.as_ref(), &blueprint)
        .await
        .with_context(|| format!("loading bindings of {blueprint}"))?;
      out.bindings(&ctx)?;
    }

    Command::Available { blueprint } => {
      let factories = query::available_factories(client.as_ref(), &blueprint)
        .await
        .with_context(|| format!("loading factories available to {blueprint}"))?;
      out.factories(&factories)?;
    }

    Command::Compare { blueprint, from, to } => {
      let diff = query::compare_versions(client.as_ref(), &blueprint, from, to)
        .await
        .with_context(|| format!("comparing {blueprint} v{from} with v{to}"))?;
      out.diff(&diff)?;
    }

    Command::Apply {
      blueprint,
      version,
      factories,
      components,
      full_sync,
      auto_sync,
      notify_admin,
    } => {
      let components =
        if components.is_empty() { Component::ALL.to_vec() } else { components };
      let options = SyncOptions { full_sync, auto_sync, notify_admin, components };

      let orchestrator = Orchestrator::new(client, &sync);
      let mut ctx = orchestrator
        .load_context(&blueprint)
        .await
        .with_context(|| format!("loading {blueprint}"))?;
      let report = orchestrator
        .apply_blueprint(&mut ctx, version, &factories, options, print_progress)
        .await?;
      return finish(&out, &report);
    }

    Command::Sync { blueprint } => {
      let orchestrator = Orchestrator::new(client, &sync);
      let mut ctx = orchestrator
        .load_context(&blueprint)
        .await
        .with_context(|| format!("loading {blueprint}"))?;
      let report = orchestrator.batch_sync(&mut ctx, print_progress).await?;
      return finish(&out, &report);
    }

    Command::Rollback { blueprint, factory, to, reason } => {
      let orchestrator = Orchestrator::new(client, &sync);
      let mut ctx = orchestrator
        .load_context(&blueprint)
        .await
        .with_context(|| format!("loading {blueprint}"))?;
      let outcome = orchestrator
        .rollback_controller()
        .rollback(&mut ctx, &factory, to, &reason)
        .await
        .with_context(|| format!("rolling {factory} back to version {to}"))?;
      out.rollback(&outcome)?;
    }

    Command::History { factory } => {
      let events = client
        .list_binding_events(&factory)
        .await
        .with_context(|| format!("loading history of {factory}"))?;
      out.events(&events)?;
    }
  }

  Ok(ExitCode::SUCCESS)
}

fn finish(out: &Output, report: &ApplyReport) -> Result<ExitCode> {
  out.report(report)?;
  Ok(if report.all_succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_progress(p: Progress) {
  let percent = p.fraction * 100.0;
  match p.phase {
    Phase::Dispatched => eprintln!("[{percent:>3.0}%] applying to {}", p.factory_id),
    Phase::Completed => {
      eprintln!("[{percent:>3.0}%] {} done ({}/{})", p.factory_id, p.completed, p.total)
    }
  }
}
