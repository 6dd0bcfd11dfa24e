//! Loosely-typed backend records and the one table of defaults that turns
//! them into domain types.
//!
//! Backends are not always strict about which fields they send. Rather than
//! scattering fallbacks across callers, every optional field is modelled as
//! an `Option<T>` here and resolved in exactly one place:
//!
//! | Record    | Field                 | When missing                                   |
//! |-----------|-----------------------|------------------------------------------------|
//! | binding   | `factory_id`          | error (identity is never defaulted)            |
//! | binding   | `blueprint_id`        | the blueprint the list was requested for       |
//! | binding   | `applied_version`     | `0` (unbound)                                  |
//! | binding   | `needs_upgrade`       | `false`; recomputed by the sync context        |
//! | binding   | `last_applied_at`     | Unix epoch                                     |
//! | binding   | `notification_status` | `NONE`                                         |
//! | version   | `version`             | error                                          |
//! | version   | `change_type`         | `UPDATE`                                       |
//! | version   | `change_description`  | empty string                                   |
//! | version   | `is_published`        | `true` if `published_at` is set, else `false`  |
//! | version   | `created_at`          | Unix epoch                                     |
//! | version   | `config`              | empty snapshot                                 |
//! | compare   | each field list       | empty list                                     |

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
  Error, Result,
  binding::{FactoryBinding, NotificationStatus, UNBOUND},
  diff::VersionCompareResult,
  version::{BlueprintVersion, ChangeType, ConfigSnapshot},
};

fn epoch() -> DateTime<Utc> { DateTime::<Utc>::UNIX_EPOCH }

// ─── Binding ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireBinding {
  pub blueprint_id:        Option<String>,
  pub factory_id:          Option<String>,
  pub applied_version:     Option<u32>,
  pub needs_upgrade:       Option<bool>,
  pub last_applied_at:     Option<DateTime<Utc>>,
  pub notification_status: Option<NotificationStatus>,
}

impl WireBinding {
  pub fn resolve(self, blueprint_id: &str) -> Result<FactoryBinding> {
    let factory_id = self
      .factory_id
      .ok_or_else(|| Error::Backend("binding record without factory_id".into()))?;
    Ok(FactoryBinding {
      blueprint_id: self.blueprint_id.unwrap_or_else(|| blueprint_id.to_owned()),
      factory_id,
      applied_version: self.applied_version.unwrap_or(UNBOUND),
      needs_upgrade: self.needs_upgrade.unwrap_or(false),
      last_applied_at: self.last_applied_at.unwrap_or_else(epoch),
      notification_status: self.notification_status.unwrap_or_default(),
    })
  }
}

// ─── Version ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireVersion {
  pub blueprint_id:       Option<String>,
  pub version:            Option<u32>,
  pub change_type:        Option<ChangeType>,
  pub change_description: Option<String>,
  pub is_published:       Option<bool>,
  pub created_at:         Option<DateTime<Utc>>,
  pub published_at:       Option<DateTime<Utc>>,
  pub config:             Option<ConfigSnapshot>,
}

impl WireVersion {
  pub fn resolve(self, blueprint_id: &str) -> Result<BlueprintVersion> {
    let version = self
      .version
      .ok_or_else(|| Error::Backend("version record without a number".into()))?;
    Ok(BlueprintVersion {
      blueprint_id: self.blueprint_id.unwrap_or_else(|| blueprint_id.to_owned()),
      version,
      change_type: self.change_type.unwrap_or(ChangeType::Update),
      change_description: self.change_description.unwrap_or_default(),
      is_published: self.is_published.unwrap_or(self.published_at.is_some()),
      created_at: self.created_at.unwrap_or_else(epoch),
      published_at: self.published_at,
      config: self.config.unwrap_or_default(),
    })
  }
}

// ─── Compare ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireCompareResult {
  pub added_fields:    Option<Vec<String>>,
  pub modified_fields: Option<Vec<String>>,
  pub removed_fields:  Option<Vec<String>>,
}

impl From<WireCompareResult> for VersionCompareResult {
  fn from(w: WireCompareResult) -> Self {
    Self {
      added_fields:    w.added_fields.unwrap_or_default(),
      modified_fields: w.modified_fields.unwrap_or_default(),
      removed_fields:  w.removed_fields.unwrap_or_default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sparse_binding_takes_table_defaults() {
    let wire: WireBinding = serde_json::from_str(r#"{"factory_id":"F1"}"#).unwrap();
    let binding = wire.resolve("BP001").unwrap();
    assert_eq!(binding.blueprint_id, "BP001");
    assert_eq!(binding.applied_version, UNBOUND);
    assert!(!binding.needs_upgrade);
    assert_eq!(binding.last_applied_at, DateTime::<Utc>::UNIX_EPOCH);
    assert_eq!(binding.notification_status, NotificationStatus::Unrequested);
  }

  #[test]
  fn binding_without_identity_is_rejected() {
    let wire: WireBinding = serde_json::from_str(r#"{"applied_version":2}"#).unwrap();
    assert!(matches!(wire.resolve("BP001"), Err(Error::Backend(_))));
  }

  #[test]
  fn version_publication_inferred_from_timestamp() {
    let wire: WireVersion = serde_json::from_str(
      r#"{"version":2,"published_at":"2024-05-01T00:00:00Z"}"#,
    )
    .unwrap();
    let v = wire.resolve("BP001").unwrap();
    assert!(v.is_published);
    assert_eq!(v.change_type, ChangeType::Update);
    assert!(v.config.is_empty());

    let wire: WireVersion = serde_json::from_str(r#"{"version":3}"#).unwrap();
    assert!(!wire.resolve("BP001").unwrap().is_published);
  }

  #[test]
  fn explicit_fields_win_over_defaults() {
    let wire: WireVersion = serde_json::from_str(
      r#"{"version":1,"change_type":"CREATE","change_description":"initial","is_published":false,"published_at":"2024-05-01T00:00:00Z"}"#,
    )
    .unwrap();
    let v = wire.resolve("BP001").unwrap();
    assert_eq!(v.change_type, ChangeType::Create);
    assert_eq!(v.change_description, "initial");
    assert!(!v.is_published);
  }

  #[test]
  fn compare_lists_default_to_empty() {
    let wire: WireCompareResult =
      serde_json::from_str(r#"{"added_fields":["materials"]}"#).unwrap();
    let result = VersionCompareResult::from(wire);
    assert_eq!(result.added_fields, vec!["materials"]);
    assert!(result.modified_fields.is_empty());
    assert!(result.removed_fields.is_empty());
  }
}
