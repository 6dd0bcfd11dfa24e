//! Request and result types for the apply and rollback primitives.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, binding::FactoryBinding};

// ─── Components ──────────────────────────────────────────────────────────────

/// A configuration section that an apply can push to a factory. The serde
/// form matches the top-level keys of a configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Component {
  ProductTypes,
  Materials,
  Departments,
  FormTemplates,
  BusinessRules,
  ConversionRates,
}

impl Component {
  pub const ALL: [Component; 6] = [
    Component::ProductTypes,
    Component::Materials,
    Component::Departments,
    Component::FormTemplates,
    Component::BusinessRules,
    Component::ConversionRates,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::ProductTypes => "productTypes",
      Self::Materials => "materials",
      Self::Departments => "departments",
      Self::FormTemplates => "formTemplates",
      Self::BusinessRules => "businessRules",
      Self::ConversionRates => "conversionRates",
    }
  }
}

impl fmt::Display for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts `productTypes`, `product-types` and `product_types` alike.
impl FromStr for Component {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let folded: String = s
      .chars()
      .filter(|c| *c != '-' && *c != '_')
      .flat_map(char::to_lowercase)
      .collect();
    Self::ALL
      .into_iter()
      .find(|c| c.as_str().to_lowercase() == folded)
      .ok_or_else(|| Error::validation(format!("unknown component: {s:?}")))
  }
}

// ─── Options ─────────────────────────────────────────────────────────────────

/// Per-call apply settings. None of these are persisted on the binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
  #[serde(default)]
  pub full_sync:    bool,
  #[serde(default)]
  pub auto_sync:    bool,
  #[serde(default)]
  pub notify_admin: bool,
  #[serde(default)]
  pub components:   Vec<Component>,
}

impl SyncOptions {
  pub fn with_components(components: impl IntoIterator<Item = Component>) -> Self {
    Self { components: components.into_iter().collect(), ..Self::default() }
  }

  /// Every section; used by batch sync.
  pub fn all_components() -> Self { Self::with_components(Component::ALL) }

  pub fn validate(&self) -> Result<()> {
    if self.components.is_empty() {
      return Err(Error::validation("select at least one option"));
    }
    Ok(())
  }
}

// ─── Upgrade ─────────────────────────────────────────────────────────────────

/// Body of the per-factory upgrade primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
  pub blueprint_id:     String,
  pub target_version:   u32,
  /// The applied version the caller last observed (`0` for unbound). A
  /// mismatch is reported as a conflict rather than silently overwritten.
  #[serde(default)]
  pub expected_version: Option<u32>,
  pub sync_options:     SyncOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingResult {
  pub binding: FactoryBinding,
  /// `false` when the binding was already at the target version.
  pub changed: bool,
}

// ─── Rollback ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
  /// `0` unbinds the factory.
  pub target_version: u32,
  #[serde(default)]
  pub reason:         String,
  /// The blueprint the caller believes the factory is bound to. When set, a
  /// binding to any other blueprint is reported as a conflict.
  #[serde(default)]
  pub blueprint_id:   Option<String>,
}

impl RollbackRequest {
  pub fn new(target_version: u32, reason: impl Into<String>) -> Self {
    Self { target_version, reason: reason.into(), blueprint_id: None }
  }

  pub fn for_blueprint(mut self, blueprint_id: impl Into<String>) -> Self {
    self.blueprint_id = Some(blueprint_id.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
  pub success: bool,
  pub summary: String,
  /// The binding after the rollback; `None` once unbound.
  pub binding: Option<FactoryBinding>,
}
