//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Configuration snapshots and
//! component lists are stored as compact JSON. Enums are stored as their wire
//! spelling.

use bpsync_core::{
  binding::{BindingAction, BindingEvent, FactoryBinding, NotificationStatus},
  blueprint::{Blueprint, BlueprintStatus},
  factory::Factory,
  sync::Component,
  version::{BlueprintVersion, ChangeType, ConfigSnapshot},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<BlueprintStatus> {
  match s {
    "draft" => Ok(BlueprintStatus::Draft),
    "active" => Ok(BlueprintStatus::Active),
    "inactive" => Ok(BlueprintStatus::Inactive),
    other => Err(Error::Decode(format!("unknown blueprint status: {other:?}"))),
  }
}

pub fn decode_change_type(s: &str) -> Result<ChangeType> {
  match s {
    "CREATE" => Ok(ChangeType::Create),
    "UPDATE" => Ok(ChangeType::Update),
    "PUBLISH" => Ok(ChangeType::Publish),
    "DEPRECATE" => Ok(ChangeType::Deprecate),
    other => Err(Error::Decode(format!("unknown change type: {other:?}"))),
  }
}

pub fn decode_notification(s: &str) -> Result<NotificationStatus> {
  match s {
    "PENDING" => Ok(NotificationStatus::Pending),
    "SENT" => Ok(NotificationStatus::Sent),
    "NONE" => Ok(NotificationStatus::Unrequested),
    other => Err(Error::Decode(format!("unknown notification status: {other:?}"))),
  }
}

pub fn decode_action(s: &str) -> Result<BindingAction> {
  match s {
    "apply" => Ok(BindingAction::Apply),
    "rollback" => Ok(BindingAction::Rollback),
    "unbind" => Ok(BindingAction::Unbind),
    other => Err(Error::Decode(format!("unknown binding action: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_config(config: &ConfigSnapshot) -> Result<String> {
  Ok(serde_json::to_string(config)?)
}

pub fn decode_config(s: &str) -> Result<ConfigSnapshot> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_components(components: &[Component]) -> Result<String> {
  Ok(serde_json::to_string(components)?)
}

pub fn decode_components(s: &str) -> Result<Vec<Component>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const BLUEPRINT_COLUMNS: &str = "blueprint_id, name, industry_type, description, \
                                     status, current_version, created_at, updated_at";

/// Raw values read directly from a `blueprints` row.
pub struct RawBlueprint {
  pub blueprint_id:    String,
  pub name:            String,
  pub industry_type:   String,
  pub description:     Option<String>,
  pub status:          String,
  pub current_version: u32,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawBlueprint {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      blueprint_id:    row.get(0)?,
      name:            row.get(1)?,
      industry_type:   row.get(2)?,
      description:     row.get(3)?,
      status:          row.get(4)?,
      current_version: row.get(5)?,
      created_at:      row.get(6)?,
      updated_at:      row.get(7)?,
    })
  }

  pub fn into_blueprint(self) -> Result<Blueprint> {
    Ok(Blueprint {
      blueprint_id:    self.blueprint_id,
      name:            self.name,
      industry_type:   self.industry_type,
      description:     self.description,
      status:          decode_status(&self.status)?,
      current_version: self.current_version,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

pub const VERSION_COLUMNS: &str = "blueprint_id, version, change_type, change_description, \
                                   config_json, is_published, created_at, published_at";

/// Raw values read directly from a `blueprint_versions` row.
pub struct RawVersion {
  pub blueprint_id:       String,
  pub version:            u32,
  pub change_type:        String,
  pub change_description: String,
  pub config_json:        String,
  pub is_published:       bool,
  pub created_at:         String,
  pub published_at:       Option<String>,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      blueprint_id:       row.get(0)?,
      version:            row.get(1)?,
      change_type:        row.get(2)?,
      change_description: row.get(3)?,
      config_json:        row.get(4)?,
      is_published:       row.get(5)?,
      created_at:         row.get(6)?,
      published_at:       row.get(7)?,
    })
  }

  pub fn into_version(self) -> Result<BlueprintVersion> {
    Ok(BlueprintVersion {
      blueprint_id:       self.blueprint_id,
      version:            self.version,
      change_type:        decode_change_type(&self.change_type)?,
      change_description: self.change_description,
      is_published:       self.is_published,
      created_at:         decode_dt(&self.created_at)?,
      published_at:       self.published_at.as_deref().map(decode_dt).transpose()?,
      config:             decode_config(&self.config_json)?,
    })
  }
}

/// `factories` joined with the factory's binding, if any.
pub const FACTORY_SELECT: &str = "SELECT f.factory_id, f.name, f.industry_type, \
                                         b.blueprint_id, f.created_at
                                  FROM factories f
                                  LEFT JOIN factory_bindings b ON b.factory_id = f.factory_id";

pub struct RawFactory {
  pub factory_id:         String,
  pub name:               String,
  pub industry_type:      Option<String>,
  pub bound_blueprint_id: Option<String>,
  pub created_at:         String,
}

impl RawFactory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      factory_id:         row.get(0)?,
      name:               row.get(1)?,
      industry_type:      row.get(2)?,
      bound_blueprint_id: row.get(3)?,
      created_at:         row.get(4)?,
    })
  }

  pub fn into_factory(self) -> Result<Factory> {
    Ok(Factory {
      factory_id:         self.factory_id,
      name:               self.name,
      industry_type:      self.industry_type,
      bound_blueprint_id: self.bound_blueprint_id,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// `factory_bindings` joined with the owning blueprint so that drift can be
/// computed on read.
pub const BINDING_SELECT: &str = "SELECT fb.blueprint_id, fb.factory_id, fb.applied_version, \
                                         fb.last_applied_at, fb.notification_status, \
                                         bp.status, bp.current_version
                                  FROM factory_bindings fb
                                  JOIN blueprints bp ON bp.blueprint_id = fb.blueprint_id";

pub struct RawBinding {
  pub blueprint_id:        String,
  pub factory_id:          String,
  pub applied_version:     u32,
  pub last_applied_at:     String,
  pub notification_status: String,
  pub blueprint_status:    String,
  pub current_version:     u32,
}

impl RawBinding {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      blueprint_id:        row.get(0)?,
      factory_id:          row.get(1)?,
      applied_version:     row.get(2)?,
      last_applied_at:     row.get(3)?,
      notification_status: row.get(4)?,
      blueprint_status:    row.get(5)?,
      current_version:     row.get(6)?,
    })
  }

  pub fn into_binding(self) -> Result<FactoryBinding> {
    let status = decode_status(&self.blueprint_status)?;
    Ok(FactoryBinding {
      needs_upgrade:       status == BlueprintStatus::Active
        && self.applied_version < self.current_version,
      blueprint_id:        self.blueprint_id,
      factory_id:          self.factory_id,
      applied_version:     self.applied_version,
      last_applied_at:     decode_dt(&self.last_applied_at)?,
      notification_status: decode_notification(&self.notification_status)?,
    })
  }
}

pub struct RawEvent {
  pub event_id:        String,
  pub blueprint_id:    String,
  pub factory_id:      String,
  pub action:          String,
  pub from_version:    u32,
  pub to_version:      u32,
  pub reason:          Option<String>,
  pub components_json: String,
  pub recorded_at:     String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:        row.get(0)?,
      blueprint_id:    row.get(1)?,
      factory_id:      row.get(2)?,
      action:          row.get(3)?,
      from_version:    row.get(4)?,
      to_version:      row.get(5)?,
      reason:          row.get(6)?,
      components_json: row.get(7)?,
      recorded_at:     row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<BindingEvent> {
    Ok(BindingEvent {
      event_id:     Uuid::parse_str(&self.event_id)?,
      blueprint_id: self.blueprint_id,
      factory_id:   self.factory_id,
      action:       decode_action(&self.action)?,
      from_version: self.from_version,
      to_version:   self.to_version,
      reason:       self.reason,
      components:   decode_components(&self.components_json)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
