//! Factory bindings and the binding state machine.
//!
//! A binding ties one factory to one version of one blueprint. Its lifecycle
//! is `Unbound → Bound(v) → Bound(v') → ... → Unbound`; forward moves happen
//! only through an apply, backward moves only through a rollback. Every
//! accepted move is recorded in an append-only event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, sync::Component};

/// The applied-version sentinel meaning "no binding".
pub const UNBOUND: u32 = 0;

// ─── Binding record ──────────────────────────────────────────────────────────

/// Whether the factory's admin has been told about the last apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
  Pending,
  Sent,
  #[default]
  #[serde(rename = "NONE")]
  Unrequested,
}

impl NotificationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Sent => "SENT",
      Self::Unrequested => "NONE",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryBinding {
  pub blueprint_id:        String,
  pub factory_id:          String,
  pub applied_version:     u32,
  /// Derived on every read; never trusted from a cache.
  pub needs_upgrade:       bool,
  pub last_applied_at:     DateTime<Utc>,
  pub notification_status: NotificationStatus,
}

// ─── State machine ───────────────────────────────────────────────────────────

/// The state of a single (blueprint, factory) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
  Unbound,
  Bound(u32),
}

impl BindingState {
  pub fn of(binding: Option<&FactoryBinding>) -> Self {
    match binding {
      Some(b) if b.applied_version != UNBOUND => Self::Bound(b.applied_version),
      _ => Self::Unbound,
    }
  }

  pub fn version(self) -> u32 {
    match self {
      Self::Unbound => UNBOUND,
      Self::Bound(v) => v,
    }
  }

  /// The state after applying `target`. Applying the version already bound
  /// is accepted and leaves the state unchanged.
  pub fn upgrade(self, target: u32) -> Result<Self> {
    if target == UNBOUND {
      return Err(Error::validation("target version must be at least 1"));
    }
    match self {
      Self::Bound(current) if target < current => Err(Error::validation(format!(
        "cannot apply version {target} over version {current}; use rollback"
      ))),
      _ => Ok(Self::Bound(target)),
    }
  }

  /// The state after rolling back to `target`; `0` unbinds. Rolling back to
  /// the current state is accepted as a no-op.
  pub fn rollback(self, target: u32) -> Result<Self> {
    let current = self.version();
    if target > current {
      return Err(Error::validation(format!(
        "cannot roll back to version {target}: currently at {current}"
      )));
    }
    Ok(if target == UNBOUND { Self::Unbound } else { Self::Bound(target) })
  }
}

// ─── Event log ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingAction {
  Apply,
  Rollback,
  Unbind,
}

impl BindingAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Apply => "apply",
      Self::Rollback => "rollback",
      Self::Unbind => "unbind",
    }
  }
}

/// One accepted binding transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEvent {
  pub event_id:     Uuid,
  pub blueprint_id: String,
  pub factory_id:   String,
  pub action:       BindingAction,
  pub from_version: u32,
  pub to_version:   u32,
  pub reason:       Option<String>,
  /// Sections pushed by an apply; empty for rollbacks.
  pub components:   Vec<Component>,
  pub recorded_at:  DateTime<Utc>,
}
