//! Blueprint catalog types.
//!
//! A blueprint is a versioned, industry-specific configuration template. The
//! blueprint row itself only holds metadata and a pointer to its newest
//! version; the configuration lives in [`crate::version::BlueprintVersion`]
//! snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, version::ConfigSnapshot};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Publication status of a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintStatus {
  Draft,
  Active,
  Inactive,
}

/// An admin action that moves a blueprint between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
  /// draft → active
  Publish,
  /// active → inactive
  Deactivate,
  /// inactive → active
  Reactivate,
}

impl BlueprintStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Active => "active",
      Self::Inactive => "inactive",
    }
  }

  /// The status reached by applying `action`, or
  /// [`Error::InvalidTransition`] when the pair is not allowed.
  pub fn apply(self, action: StatusAction) -> Result<Self> {
    match (self, action) {
      (Self::Draft, StatusAction::Publish) => Ok(Self::Active),
      (Self::Active, StatusAction::Deactivate) => Ok(Self::Inactive),
      (Self::Inactive, StatusAction::Reactivate) => Ok(Self::Active),
      (from, action) => Err(Error::InvalidTransition { from, action }),
    }
  }

  /// Deactivation keeps existing bindings but blocks new ones.
  pub fn accepts_new_bindings(self) -> bool { self == Self::Active }
}

impl fmt::Display for BlueprintStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for StatusAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Publish => "publish",
      Self::Deactivate => "deactivate",
      Self::Reactivate => "reactivate",
    })
  }
}

// ─── Blueprint ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
  pub blueprint_id:    String,
  pub name:            String,
  pub industry_type:   String,
  pub description:     Option<String>,
  pub status:          BlueprintStatus,
  /// Always equal to the highest version number in the history.
  pub current_version: u32,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Blueprint {
  /// Drift check for a binding at `applied_version`. Only active blueprints
  /// report drift.
  pub fn needs_upgrade(&self, applied_version: u32) -> bool {
    self.status == BlueprintStatus::Active
      && applied_version < self.current_version
  }
}

// ─── NewBlueprint ────────────────────────────────────────────────────────────

/// Input to [`crate::store::BlueprintStore::create_blueprint`].
#[derive(Debug, Clone)]
pub struct NewBlueprint {
  /// Caller-chosen id; the store generates one when absent.
  pub blueprint_id:  Option<String>,
  pub name:          String,
  pub industry_type: String,
  pub description:   Option<String>,
  /// Configuration recorded as version 1.
  pub config:        ConfigSnapshot,
}

impl NewBlueprint {
  pub fn new(name: impl Into<String>, industry_type: impl Into<String>) -> Self {
    Self {
      blueprint_id:  None,
      name:          name.into(),
      industry_type: industry_type.into(),
      description:   None,
      config:        ConfigSnapshot::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn blueprint(status: BlueprintStatus, current_version: u32) -> Blueprint {
    let ts = Utc.timestamp_opt(1_000_000, 0).unwrap();
    Blueprint {
      blueprint_id: "BP001".into(),
      name: "Dairy".into(),
      industry_type: "dairy".into(),
      description: None,
      status,
      current_version,
      created_at: ts,
      updated_at: ts,
    }
  }

  #[test]
  fn allowed_transitions() {
    use BlueprintStatus::*;
    assert_eq!(Draft.apply(StatusAction::Publish).unwrap(), Active);
    assert_eq!(Active.apply(StatusAction::Deactivate).unwrap(), Inactive);
    assert_eq!(Inactive.apply(StatusAction::Reactivate).unwrap(), Active);
  }

  #[test]
  fn rejected_transitions() {
    use BlueprintStatus::*;
    for (from, action) in [
      (Draft, StatusAction::Deactivate),
      (Draft, StatusAction::Reactivate),
      (Active, StatusAction::Publish),
      (Active, StatusAction::Reactivate),
      (Inactive, StatusAction::Publish),
      (Inactive, StatusAction::Deactivate),
    ] {
      let err = from.apply(action).unwrap_err();
      assert!(matches!(err, Error::InvalidTransition { .. }), "{from} {action}");
    }
  }

  #[test]
  fn only_active_blueprints_drift() {
    assert!(blueprint(BlueprintStatus::Active, 3).needs_upgrade(1));
    assert!(!blueprint(BlueprintStatus::Active, 3).needs_upgrade(3));
    assert!(!blueprint(BlueprintStatus::Inactive, 3).needs_upgrade(1));
    assert!(!blueprint(BlueprintStatus::Draft, 3).needs_upgrade(1));
  }
}
