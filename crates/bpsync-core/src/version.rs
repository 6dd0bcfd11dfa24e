//! Version history types.
//!
//! A version is an immutable snapshot of a blueprint's configuration. Edits
//! never mutate an existing version; they append a new one with the next
//! number. Publication is tracked on the version but is independent of its
//! creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blueprint configuration: top-level keys are configuration sections
/// (`productTypes`, `materials`, ...), values are arbitrary JSON.
pub type ConfigSnapshot = serde_json::Map<String, serde_json::Value>;

/// Why a version was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
  Create,
  Update,
  Publish,
  Deprecate,
}

impl ChangeType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Create => "CREATE",
      Self::Update => "UPDATE",
      Self::Publish => "PUBLISH",
      Self::Deprecate => "DEPRECATE",
    }
  }
}

/// One entry in a blueprint's append-only version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintVersion {
  pub blueprint_id:       String,
  /// 1-based, contiguous and strictly increasing per blueprint.
  pub version:            u32,
  pub change_type:        ChangeType,
  pub change_description: String,
  pub is_published:       bool,
  pub created_at:         DateTime<Utc>,
  pub published_at:       Option<DateTime<Utc>>,
  pub config:             ConfigSnapshot,
}

/// Input to [`crate::store::BlueprintStore::create_version`].
/// The version number is always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewVersion {
  pub change_type:        ChangeType,
  pub change_description: String,
  /// `None` carries the previous version's configuration forward unchanged.
  pub config:             Option<ConfigSnapshot>,
}

impl NewVersion {
  pub fn new(change_type: ChangeType, change_description: impl Into<String>) -> Self {
    Self {
      change_type,
      change_description: change_description.into(),
      config: None,
    }
  }

  pub fn with_config(mut self, config: ConfigSnapshot) -> Self {
    self.config = Some(config);
    self
  }
}

/// The number the next version of a blueprint receives, given the highest
/// existing one.
pub fn next_version(current_max: Option<u32>) -> u32 {
  current_max.map_or(1, |v| v + 1)
}
