//! Renders results to stdout, as text or as JSON.

use anyhow::Result;
use bpsync_client::{ApplyReport, BlueprintSyncContext, Outcome};
use bpsync_core::{
  binding::{BindingEvent, FactoryBinding},
  blueprint::Blueprint,
  diff::VersionCompareResult,
  factory::Factory,
  sync::RollbackOutcome,
  version::BlueprintVersion,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy)]
pub struct Output {
  json: bool,
}

impl Output {
  pub fn new(json: bool) -> Self { Self { json } }

  fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(value)?);
    } else {
      text(value);
    }
    Ok(())
  }

  pub fn blueprints(&self, blueprints: &[Blueprint]) -> Result<()> {
    self.emit(blueprints, |list| {
      for bp in list {
        println!(
          "{:<12} {:<8} v{:<4} {} ({})",
          bp.blueprint_id, bp.status.as_str(), bp.current_version, bp.name, bp.industry_type
        );
      }
    })
  }

  pub fn versions(&self, versions: &[BlueprintVersion]) -> Result<()> {
    self.emit(versions, |list| {
      for v in list {
        let published = if v.is_published { "published" } else { "" };
        println!(
          "v{:<4} {:<9} {:<9} {}  {}",
          v.version,
          v.change_type.as_str(),
          published,
          time(&v.created_at),
          v.change_description
        );
      }
    })
  }

  pub fn bindings(&self, ctx: &BlueprintSyncContext) -> Result<()> {
    let bindings: Vec<&FactoryBinding> = ctx.bindings().collect();
    let current = ctx.current_version();
    self.emit(&bindings, |list| {
      if list.is_empty() {
        println!("no factories bound to {}", ctx.blueprint_id());
      }
      for b in list {
        let drift = if b.needs_upgrade {
          format!("needs upgrade to v{current}")
        } else {
          "up to date".to_string()
        };
        println!(
          "{:<12} v{:<4} {:<24} notification {}  applied {}",
          b.factory_id,
          b.applied_version,
          drift,
          b.notification_status.as_str(),
          time(&b.last_applied_at)
        );
      }
    })
  }

  pub fn factories(&self, factories: &[Factory]) -> Result<()> {
    self.emit(factories, |list| {
      for f in list {
        println!("{:<12} {}", f.factory_id, f.name);
      }
    })
  }

  pub fn diff(&self, diff: &VersionCompareResult) -> Result<()> {
    self.emit(diff, |d| {
      if d.is_empty() {
        println!("no differences");
      }
      for field in &d.added_fields {
        println!("+ {field}");
      }
      for field in &d.modified_fields {
        println!("~ {field}");
      }
      for field in &d.removed_fields {
        println!("- {field}");
      }
    })
  }

  pub fn report(&self, report: &ApplyReport) -> Result<()> {
    self.emit(report, |r| {
      for o in &r.outcomes {
        match &o.outcome {
          Outcome::Applied { binding, changed } => {
            let note = if *changed { "" } else { " (already applied)" };
            println!("ok    {:<12} v{}{note}", o.factory_id, binding.applied_version);
          }
          Outcome::Failed { message, .. } => println!("FAIL  {:<12} {message}", o.factory_id),
        }
      }
      println!(
        "{}/{} factories at version {} of {}",
        r.success_count, r.total_count, r.target_version, r.blueprint_id
      );
    })
  }

  pub fn rollback(&self, outcome: &RollbackOutcome) -> Result<()> {
    self.emit(outcome, |o| println!("{}", o.summary))
  }

  pub fn events(&self, events: &[BindingEvent]) -> Result<()> {
    self.emit(events, |list| {
      for e in list {
        let components: Vec<&str> = e.components.iter().map(|c| c.as_str()).collect();
        println!(
          "{}  {:<8} {:<12} v{} -> v{}  [{}]  {}",
          time(&e.recorded_at),
          e.action.as_str(),
          e.blueprint_id,
          e.from_version,
          e.to_version,
          components.join(", "),
          e.reason.as_deref().unwrap_or("")
        );
      }
    })
  }
}

fn time(at: &DateTime<Utc>) -> String { at.format(TIME_FORMAT).to_string() }
