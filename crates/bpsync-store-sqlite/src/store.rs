//! [`SqliteStore`]: the SQLite implementation of [`BlueprintStore`].

use std::path::Path;

use bpsync_core::{
  binding::{BindingEvent, FactoryBinding},
  blueprint::{Blueprint, BlueprintStatus, NewBlueprint, StatusAction},
  diff::VersionCompareResult,
  factory::{Factory, NewFactory},
  store::BlueprintStore,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::{BlueprintVersion, NewVersion},
};
use chrono::Utc;

use crate::{
  Result,
  encode::{
    BINDING_SELECT, BLUEPRINT_COLUMNS, FACTORY_SELECT, RawBinding, RawBlueprint,
    RawEvent, RawFactory, RawVersion, VERSION_COLUMNS,
  },
  ops,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A blueprint store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── BlueprintStore impl ─────────────────────────────────────────────────────

impl BlueprintStore for SqliteStore {
  type Error = crate::Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn create_blueprint(&self, input: NewBlueprint) -> Result<Blueprint> {
    self
      .conn
      .call(move |conn| Ok(ops::create_blueprint(conn, input, Utc::now())))
      .await?
  }

  async fn get_blueprint(&self, blueprint_id: &str) -> Result<Option<Blueprint>> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::fetch_blueprint(conn, &id)))
      .await?
  }

  async fn list_blueprints(&self, status: Option<BlueprintStatus>) -> Result<Vec<Blueprint>> {
    let status_str = status.map(BlueprintStatus::as_str);

    let raws: Vec<RawBlueprint> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BLUEPRINT_COLUMNS} FROM blueprints
           WHERE ?1 IS NULL OR status = ?1
           ORDER BY created_at, blueprint_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str], RawBlueprint::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBlueprint::into_blueprint).collect()
  }

  async fn transition_blueprint(
    &self,
    blueprint_id: &str,
    action: StatusAction,
  ) -> Result<Blueprint> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::transition_blueprint(conn, &id, action, Utc::now())))
      .await?
  }

  async fn delete_blueprint(&self, blueprint_id: &str) -> Result<()> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::delete_blueprint(conn, &id)))
      .await?
  }

  // ── Version history ───────────────────────────────────────────────────────

  async fn create_version(
    &self,
    blueprint_id: &str,
    input: NewVersion,
  ) -> Result<BlueprintVersion> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::create_version(conn, &id, input, Utc::now())))
      .await?
  }

  async fn get_version(
    &self,
    blueprint_id: &str,
    version: u32,
  ) -> Result<Option<BlueprintVersion>> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::fetch_version(conn, &id, version)))
      .await?
  }

  async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
    let id = blueprint_id.to_owned();

    let raws: Result<Vec<RawVersion>> = self
      .conn
      .call(move |conn| {
        if let Err(e) = ops::require_blueprint(conn, &id) {
          return Ok(Err(e));
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {VERSION_COLUMNS} FROM blueprint_versions
           WHERE blueprint_id = ?1
           ORDER BY version DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    raws?.into_iter().map(RawVersion::into_version).collect()
  }

  async fn publish_version(
    &self,
    blueprint_id: &str,
    version: u32,
  ) -> Result<BlueprintVersion> {
    let id = blueprint_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::publish_version(conn, &id, version, Utc::now())))
      .await?
  }

  async fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> Result<VersionCompareResult> {
    let id = blueprint_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(ops::compare_versions(conn, &id, from, to)))
      .await?
  }

  // ── Factories ─────────────────────────────────────────────────────────────

  async fn add_factory(&self, input: NewFactory) -> Result<Factory> {
    self
      .conn
      .call(move |conn| Ok(ops::add_factory(conn, input, Utc::now())))
      .await?
  }

  async fn list_factories(&self) -> Result<Vec<Factory>> {
    self.list_factories_excluding(&[]).await
  }

  async fn list_factories_excluding(&self, excluded: &[String]) -> Result<Vec<Factory>> {
    let excluded = excluded.to_vec();

    let raws: Vec<RawFactory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{FACTORY_SELECT} ORDER BY f.created_at, f.factory_id"
        ))?;
        let rows = stmt
          .query_map([], RawFactory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .filter(|raw| !excluded.contains(&raw.factory_id))
      .map(RawFactory::into_factory)
      .collect()
  }

  // ── Bindings ──────────────────────────────────────────────────────────────

  async fn list_bindings(&self, blueprint_id: &str) -> Result<Vec<FactoryBinding>> {
    let id = blueprint_id.to_owned();

    let raws: Result<Vec<RawBinding>> = self
      .conn
      .call(move |conn| {
        if let Err(e) = ops::require_blueprint(conn, &id) {
          return Ok(Err(e));
        }
        let mut stmt = conn.prepare(&format!(
          "{BINDING_SELECT} WHERE fb.blueprint_id = ?1 ORDER BY fb.factory_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawBinding::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    raws?.into_iter().map(RawBinding::into_binding).collect()
  }

  async fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> Result<BindingResult> {
    let id = factory_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::upgrade_factory(conn, &id, &request, Utc::now())))
      .await?
  }

  async fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> Result<RollbackOutcome> {
    let id = factory_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::rollback_factory(conn, &id, &request, Utc::now())))
      .await?
  }

  async fn mark_notified(&self, blueprint_id: &str, factory_id: &str) -> Result<FactoryBinding> {
    let blueprint_id = blueprint_id.to_owned();
    let factory_id = factory_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(ops::mark_notified(conn, &blueprint_id, &factory_id)))
      .await?
  }

  async fn list_binding_events(&self, factory_id: &str) -> Result<Vec<BindingEvent>> {
    let id = factory_id.to_owned();

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, blueprint_id, factory_id, action, from_version,
                  to_version, reason, components_json, recorded_at
           FROM binding_events
           WHERE factory_id = ?1
           ORDER BY recorded_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}
