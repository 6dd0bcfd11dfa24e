//! Factory: the tenant a blueprint is applied to.
//!
//! Factory master data is owned elsewhere; this crate only needs identity and
//! the read-time view of which blueprint (if any) the factory is bound to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
  pub factory_id:         String,
  pub name:               String,
  pub industry_type:      Option<String>,
  /// Computed at read time from the binding table.
  pub bound_blueprint_id: Option<String>,
  pub created_at:         DateTime<Utc>,
}

impl Factory {
  /// A factory holds at most one binding, so only unbound factories may take
  /// a new blueprint.
  pub fn can_bind(&self) -> bool { self.bound_blueprint_id.is_none() }
}

/// Input to [`crate::store::BlueprintStore::add_factory`].
#[derive(Debug, Clone)]
pub struct NewFactory {
  pub factory_id:    Option<String>,
  pub name:          String,
  pub industry_type: Option<String>,
}

impl NewFactory {
  pub fn new(name: impl Into<String>) -> Self {
    Self { factory_id: None, name: name.into(), industry_type: None }
  }

  pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      factory_id:    Some(id.into()),
      name:          name.into(),
      industry_type: None,
    }
  }
}
