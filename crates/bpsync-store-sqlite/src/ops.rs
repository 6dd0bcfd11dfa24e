//! Synchronous bodies of the store operations that read before they write.
//!
//! Each function runs on the connection thread inside a single
//! `tokio_rusqlite::Connection::call`, wrapped in one transaction, so the
//! read-check-write sequence is atomic with respect to every other store
//! call. Returning early with an error drops the transaction, which rolls it
//! back; no partial state is ever committed.

use bpsync_core::{
  Error as CoreError,
  binding::{BindingAction, BindingState, FactoryBinding, NotificationStatus, UNBOUND},
  blueprint::{Blueprint, NewBlueprint, StatusAction},
  diff::{VersionCompareResult, compare_snapshots},
  factory::{Factory, NewFactory},
  sync::{BindingResult, Component, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::{BlueprintVersion, ChangeType, NewVersion, next_version},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    BINDING_SELECT, BLUEPRINT_COLUMNS, FACTORY_SELECT, RawBinding, RawBlueprint,
    RawFactory, RawVersion, VERSION_COLUMNS, encode_components, encode_config,
    encode_dt,
  },
};

// ─── Lookups ─────────────────────────────────────────────────────────────────

pub fn fetch_blueprint(conn: &Connection, blueprint_id: &str) -> Result<Option<Blueprint>> {
  conn
    .query_row(
      &format!("SELECT {BLUEPRINT_COLUMNS} FROM blueprints WHERE blueprint_id = ?1"),
      params![blueprint_id],
      RawBlueprint::from_row,
    )
    .optional()?
    .map(RawBlueprint::into_blueprint)
    .transpose()
}

pub fn require_blueprint(conn: &Connection, blueprint_id: &str) -> Result<Blueprint> {
  fetch_blueprint(conn, blueprint_id)?
    .ok_or_else(|| CoreError::BlueprintNotFound(blueprint_id.to_owned()).into())
}

pub fn fetch_version(
  conn: &Connection,
  blueprint_id: &str,
  version: u32,
) -> Result<Option<BlueprintVersion>> {
  conn
    .query_row(
      &format!(
        "SELECT {VERSION_COLUMNS} FROM blueprint_versions
         WHERE blueprint_id = ?1 AND version = ?2"
      ),
      params![blueprint_id, version],
      RawVersion::from_row,
    )
    .optional()?
    .map(RawVersion::into_version)
    .transpose()
}

pub fn require_version(
  conn: &Connection,
  blueprint_id: &str,
  version: u32,
) -> Result<BlueprintVersion> {
  fetch_version(conn, blueprint_id, version)?.ok_or_else(|| {
    CoreError::VersionNotFound { blueprint_id: blueprint_id.to_owned(), version }.into()
  })
}

fn fetch_factory(conn: &Connection, factory_id: &str) -> Result<Option<Factory>> {
  conn
    .query_row(
      &format!("{FACTORY_SELECT} WHERE f.factory_id = ?1"),
      params![factory_id],
      RawFactory::from_row,
    )
    .optional()?
    .map(RawFactory::into_factory)
    .transpose()
}

fn require_factory(conn: &Connection, factory_id: &str) -> Result<Factory> {
  fetch_factory(conn, factory_id)?
    .ok_or_else(|| CoreError::FactoryNotFound(factory_id.to_owned()).into())
}

/// The binding a factory currently holds, whichever blueprint it belongs to.
fn binding_of_factory(conn: &Connection, factory_id: &str) -> Result<Option<FactoryBinding>> {
  conn
    .query_row(
      &format!("{BINDING_SELECT} WHERE fb.factory_id = ?1"),
      params![factory_id],
      RawBinding::from_row,
    )
    .optional()?
    .map(RawBinding::into_binding)
    .transpose()
}

fn binding_of(
  conn: &Connection,
  blueprint_id: &str,
  factory_id: &str,
) -> Result<Option<FactoryBinding>> {
  Ok(
    binding_of_factory(conn, factory_id)?
      .filter(|b| b.blueprint_id == blueprint_id),
  )
}

fn require_binding(
  conn: &Connection,
  blueprint_id: &str,
  factory_id: &str,
) -> Result<FactoryBinding> {
  binding_of(conn, blueprint_id, factory_id)?.ok_or_else(|| {
    CoreError::NotFound(format!(
      "factory {factory_id} is not bound to blueprint {blueprint_id}"
    ))
    .into()
  })
}

struct EventRecord<'a> {
  blueprint_id: &'a str,
  factory_id:   &'a str,
  action:       BindingAction,
  from_version: u32,
  to_version:   u32,
  reason:       Option<&'a str>,
  components:   &'a [Component],
}

fn insert_event(conn: &Connection, event: EventRecord<'_>, now: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "INSERT INTO binding_events (
       event_id, blueprint_id, factory_id, action, from_version, to_version,
       reason, components_json, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      Uuid::new_v4().hyphenated().to_string(),
      event.blueprint_id,
      event.factory_id,
      event.action.as_str(),
      event.from_version,
      event.to_version,
      event.reason,
      encode_components(event.components)?,
      encode_dt(now),
    ],
  )?;
  Ok(())
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub fn create_blueprint(
  conn: &mut Connection,
  input: NewBlueprint,
  now: DateTime<Utc>,
) -> Result<Blueprint> {
  let blueprint_id = input
    .blueprint_id
    .unwrap_or_else(|| Uuid::new_v4().hyphenated().to_string());

  let tx = conn.transaction()?;
  if fetch_blueprint(&tx, &blueprint_id)?.is_some() {
    return Err(CoreError::Conflict(format!("blueprint {blueprint_id} already exists")).into());
  }

  let at = encode_dt(now);
  tx.execute(
    "INSERT INTO blueprints (
       blueprint_id, name, industry_type, description, status,
       current_version, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, 'draft', 1, ?5, ?5)",
    params![blueprint_id, input.name, input.industry_type, input.description, at],
  )?;
  tx.execute(
    "INSERT INTO blueprint_versions (
       blueprint_id, version, change_type, change_description, config_json,
       is_published, created_at
     ) VALUES (?1, 1, ?2, ?3, ?4, 0, ?5)",
    params![
      blueprint_id,
      ChangeType::Create.as_str(),
      "initial version",
      encode_config(&input.config)?,
      at,
    ],
  )?;

  let blueprint = require_blueprint(&tx, &blueprint_id)?;
  tx.commit()?;
  Ok(blueprint)
}

pub fn transition_blueprint(
  conn: &mut Connection,
  blueprint_id: &str,
  action: StatusAction,
  now: DateTime<Utc>,
) -> Result<Blueprint> {
  let tx = conn.transaction()?;
  let blueprint = require_blueprint(&tx, blueprint_id)?;
  let next = blueprint.status.apply(action)?;

  tx.execute(
    "UPDATE blueprints SET status = ?2, updated_at = ?3 WHERE blueprint_id = ?1",
    params![blueprint_id, next.as_str(), encode_dt(now)],
  )?;

  let blueprint = require_blueprint(&tx, blueprint_id)?;
  tx.commit()?;
  Ok(blueprint)
}

pub fn delete_blueprint(conn: &mut Connection, blueprint_id: &str) -> Result<()> {
  let tx = conn.transaction()?;
  require_blueprint(&tx, blueprint_id)?;

  let bound: u32 = tx.query_row(
    "SELECT COUNT(*) FROM factory_bindings WHERE blueprint_id = ?1",
    params![blueprint_id],
    |r| r.get(0),
  )?;
  if bound > 0 {
    return Err(
      CoreError::Conflict(format!(
        "blueprint {blueprint_id} has {bound} bound factories; deactivate it instead"
      ))
      .into(),
    );
  }

  tx.execute("DELETE FROM blueprint_versions WHERE blueprint_id = ?1", params![blueprint_id])?;
  tx.execute("DELETE FROM blueprints WHERE blueprint_id = ?1", params![blueprint_id])?;
  tx.commit()?;
  Ok(())
}

// ─── Version history ─────────────────────────────────────────────────────────

pub fn create_version(
  conn: &mut Connection,
  blueprint_id: &str,
  input: NewVersion,
  now: DateTime<Utc>,
) -> Result<BlueprintVersion> {
  let tx = conn.transaction()?;
  require_blueprint(&tx, blueprint_id)?;

  let current_max: Option<u32> = tx.query_row(
    "SELECT MAX(version) FROM blueprint_versions WHERE blueprint_id = ?1",
    params![blueprint_id],
    |r| r.get(0),
  )?;
  let version = next_version(current_max);

  let config = match (input.config, current_max) {
    (Some(config), _) => config,
    (None, Some(previous)) => require_version(&tx, blueprint_id, previous)?.config,
    (None, None) => Default::default(),
  };

  let at = encode_dt(now);
  tx.execute(
    "INSERT INTO blueprint_versions (
       blueprint_id, version, change_type, change_description, config_json,
       is_published, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    params![
      blueprint_id,
      version,
      input.change_type.as_str(),
      input.change_description,
      encode_config(&config)?,
      at,
    ],
  )?;
  tx.execute(
    "UPDATE blueprints SET current_version = ?2, updated_at = ?3 WHERE blueprint_id = ?1",
    params![blueprint_id, version, at],
  )?;

  let created = require_version(&tx, blueprint_id, version)?;
  tx.commit()?;
  Ok(created)
}

/// Publishing twice keeps the first `published_at`.
pub fn publish_version(
  conn: &mut Connection,
  blueprint_id: &str,
  version: u32,
  now: DateTime<Utc>,
) -> Result<BlueprintVersion> {
  let tx = conn.transaction()?;
  require_blueprint(&tx, blueprint_id)?;
  let existing = require_version(&tx, blueprint_id, version)?;
  if existing.is_published {
    return Ok(existing);
  }

  tx.execute(
    "UPDATE blueprint_versions SET is_published = 1, published_at = ?3
     WHERE blueprint_id = ?1 AND version = ?2",
    params![blueprint_id, version, encode_dt(now)],
  )?;

  let published = require_version(&tx, blueprint_id, version)?;
  tx.commit()?;
  Ok(published)
}

/// Both versions must exist; their order is the caller's choice.
pub fn compare_versions(
  conn: &Connection,
  blueprint_id: &str,
  from: u32,
  to: u32,
) -> Result<VersionCompareResult> {
  require_blueprint(conn, blueprint_id)?;
  let old = require_version(conn, blueprint_id, from)?;
  let new = require_version(conn, blueprint_id, to)?;
  Ok(compare_snapshots(&old.config, &new.config))
}

// ─── Factories ───────────────────────────────────────────────────────────────

pub fn add_factory(conn: &mut Connection, input: NewFactory, now: DateTime<Utc>) -> Result<Factory> {
  let factory_id = input
    .factory_id
    .unwrap_or_else(|| Uuid::new_v4().hyphenated().to_string());

  let tx = conn.transaction()?;
  if fetch_factory(&tx, &factory_id)?.is_some() {
    return Err(CoreError::Conflict(format!("factory {factory_id} already exists")).into());
  }
  tx.execute(
    "INSERT INTO factories (factory_id, name, industry_type, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![factory_id, input.name, input.industry_type, encode_dt(now)],
  )?;

  let factory = require_factory(&tx, &factory_id)?;
  tx.commit()?;
  Ok(factory)
}

// ─── Bindings ────────────────────────────────────────────────────────────────

pub fn upgrade_factory(
  conn: &mut Connection,
  factory_id: &str,
  request: &UpgradeRequest,
  now: DateTime<Utc>,
) -> Result<BindingResult> {
  request.sync_options.validate()?;
  let target = request.target_version;

  let tx = conn.transaction()?;
  let blueprint = require_blueprint(&tx, &request.blueprint_id)?;
  require_factory(&tx, factory_id)?;
  if target != UNBOUND {
    require_version(&tx, &blueprint.blueprint_id, target)?;
  }

  let existing = binding_of_factory(&tx, factory_id)?;
  if let Some(other) = &existing
    && other.blueprint_id != blueprint.blueprint_id
  {
    return Err(
      CoreError::Conflict(format!(
        "factory {factory_id} is bound to blueprint {}",
        other.blueprint_id
      ))
      .into(),
    );
  }

  let current = BindingState::of(existing.as_ref());

  // A retried request whose first attempt already landed.
  if let Some(binding) = existing.clone()
    && current == BindingState::Bound(target)
  {
    return Ok(BindingResult { binding, changed: false });
  }

  if let Some(expected) = request.expected_version
    && expected != current.version()
  {
    return Err(
      CoreError::Conflict(format!(
        "factory {factory_id} is at version {}, expected {expected}",
        current.version()
      ))
      .into(),
    );
  }

  current.upgrade(target)?;

  if existing.is_none() && !blueprint.status.accepts_new_bindings() {
    return Err(
      CoreError::validation(format!(
        "blueprint {} is {} and cannot take new bindings",
        blueprint.blueprint_id, blueprint.status
      ))
      .into(),
    );
  }

  let notification = if request.sync_options.notify_admin {
    NotificationStatus::Pending
  } else {
    NotificationStatus::Unrequested
  };
  let at = encode_dt(now);

  if existing.is_some() {
    tx.execute(
      "UPDATE factory_bindings
       SET applied_version = ?3, last_applied_at = ?4, notification_status = ?5
       WHERE blueprint_id = ?1 AND factory_id = ?2",
      params![blueprint.blueprint_id, factory_id, target, at, notification.as_str()],
    )?;
  } else {
    tx.execute(
      "INSERT INTO factory_bindings (
         blueprint_id, factory_id, applied_version, last_applied_at, notification_status
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      params![blueprint.blueprint_id, factory_id, target, at, notification.as_str()],
    )?;
  }

  insert_event(
    &tx,
    EventRecord {
      blueprint_id: &blueprint.blueprint_id,
      factory_id,
      action: BindingAction::Apply,
      from_version: current.version(),
      to_version: target,
      reason: None,
      components: &request.sync_options.components,
    },
    now,
  )?;

  let binding = require_binding(&tx, &blueprint.blueprint_id, factory_id)?;
  tx.commit()?;
  Ok(BindingResult { binding, changed: true })
}

pub fn rollback_factory(
  conn: &mut Connection,
  factory_id: &str,
  request: &RollbackRequest,
  now: DateTime<Utc>,
) -> Result<RollbackOutcome> {
  let target = request.target_version;
  let reason = Some(request.reason.as_str()).filter(|r| !r.is_empty());

  let tx = conn.transaction()?;
  require_factory(&tx, factory_id)?;

  let Some(binding) = binding_of_factory(&tx, factory_id)? else {
    BindingState::Unbound.rollback(target)?;
    return Ok(RollbackOutcome {
      success: true,
      summary: format!("factory {factory_id} is already unbound"),
      binding: None,
    });
  };

  if let Some(expected) = &request.blueprint_id
    && *expected != binding.blueprint_id
  {
    return Err(
      CoreError::Conflict(format!(
        "factory {factory_id} is bound to blueprint {}, not {expected}",
        binding.blueprint_id
      ))
      .into(),
    );
  }

  let current = binding.applied_version;
  let blueprint_id = binding.blueprint_id.clone();

  let outcome = match BindingState::Bound(current).rollback(target)? {
    BindingState::Bound(v) if v == current => {
      return Ok(RollbackOutcome {
        success: true,
        summary: format!("factory {factory_id} is already at version {current}"),
        binding: Some(binding),
      });
    }

    BindingState::Unbound => {
      tx.execute(
        "DELETE FROM factory_bindings WHERE blueprint_id = ?1 AND factory_id = ?2",
        params![blueprint_id, factory_id],
      )?;
      insert_event(
        &tx,
        EventRecord {
          blueprint_id: &blueprint_id,
          factory_id,
          action: BindingAction::Unbind,
          from_version: current,
          to_version: UNBOUND,
          reason,
          components: &[],
        },
        now,
      )?;
      RollbackOutcome {
        success: true,
        summary: format!(
          "factory {factory_id} unbound from blueprint {blueprint_id} (was version {current})"
        ),
        binding: None,
      }
    }

    BindingState::Bound(v) => {
      require_version(&tx, &blueprint_id, v)?;
      tx.execute(
        "UPDATE factory_bindings SET applied_version = ?3, last_applied_at = ?4
         WHERE blueprint_id = ?1 AND factory_id = ?2",
        params![blueprint_id, factory_id, v, encode_dt(now)],
      )?;
      insert_event(
        &tx,
        EventRecord {
          blueprint_id: &blueprint_id,
          factory_id,
          action: BindingAction::Rollback,
          from_version: current,
          to_version: v,
          reason,
          components: &[],
        },
        now,
      )?;
      RollbackOutcome {
        success: true,
        summary: format!("factory {factory_id} rolled back from version {current} to {v}"),
        binding: Some(require_binding(&tx, &blueprint_id, factory_id)?),
      }
    }
  };

  tx.commit()?;
  Ok(outcome)
}

pub fn mark_notified(
  conn: &mut Connection,
  blueprint_id: &str,
  factory_id: &str,
) -> Result<FactoryBinding> {
  let tx = conn.transaction()?;
  let binding = require_binding(&tx, blueprint_id, factory_id)?;
  if binding.notification_status != NotificationStatus::Pending {
    return Ok(binding);
  }

  tx.execute(
    "UPDATE factory_bindings SET notification_status = ?3
     WHERE blueprint_id = ?1 AND factory_id = ?2",
    params![blueprint_id, factory_id, NotificationStatus::Sent.as_str()],
  )?;

  let binding = require_binding(&tx, blueprint_id, factory_id)?;
  tx.commit()?;
  Ok(binding)
}
