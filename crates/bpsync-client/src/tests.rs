//! Orchestrator, rollback, and transport tests against a real in-memory store.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use bpsync_core::{
  Error, ErrorKind, Result,
  backend::SyncBackend,
  binding::FactoryBinding,
  blueprint::{Blueprint, NewBlueprint, StatusAction},
  diff::VersionCompareResult,
  factory::{Factory, NewFactory},
  store::BlueprintStore,
  sync::{
    BindingResult, Component, RollbackOutcome, RollbackRequest, SyncOptions, UpgradeRequest,
  },
  version::{BlueprintVersion, ChangeType, ConfigSnapshot, NewVersion},
};
use bpsync_store_sqlite::SqliteStore;
use serde_json::json;

use crate::{
  ApiClient, ClientConfig, LocalBackend, Orchestrator, Outcome, Phase, Progress, SyncConfig,
  query,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Wraps a backend, failing upgrades for chosen factories and recording how
/// many mutations were made and how many overlapped.
struct Faulty<B> {
  inner:          B,
  failing:        Mutex<HashSet<String>>,
  delay:          Option<Duration>,
  upgrade_calls:  AtomicUsize,
  rollback_calls: AtomicUsize,
  in_flight:      AtomicUsize,
  max_in_flight:  AtomicUsize,
}

impl<B> Faulty<B> {
  fn new(inner: B) -> Self {
    Self {
      inner,
      failing: Mutex::new(HashSet::new()),
      delay: None,
      upgrade_calls: AtomicUsize::new(0),
      rollback_calls: AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  fn fail(&self, factory_id: &str) {
    self.failing.lock().unwrap().insert(factory_id.to_owned());
  }

  fn upgrades(&self) -> usize { self.upgrade_calls.load(Ordering::SeqCst) }

  fn rollbacks(&self) -> usize { self.rollback_calls.load(Ordering::SeqCst) }

  async fn mutation<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let result = call.await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

impl<B: SyncBackend> SyncBackend for Faulty<B> {
  async fn get_blueprint(&self, blueprint_id: &str) -> Result<Blueprint> {
    self.inner.get_blueprint(blueprint_id).await
  }

  async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
    self.inner.list_versions(blueprint_id).await
  }

  async fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> Result<VersionCompareResult> {
    self.inner.compare_versions(blueprint_id, from, to).await
  }

  async fn list_bindings(&self, blueprint_id: &str) -> Result<Vec<FactoryBinding>> {
    self.inner.list_bindings(blueprint_id).await
  }

  async fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> Result<BindingResult> {
    self.upgrade_calls.fetch_add(1, Ordering::SeqCst);
    let fails = self.failing.lock().unwrap().contains(factory_id);
    self
      .mutation(async {
        if fails {
          return Err(Error::Transient(format!("injected failure for {factory_id}")));
        }
        self.inner.upgrade_factory(factory_id, request).await
      })
      .await
  }

  async fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> Result<RollbackOutcome> {
    self.rollback_calls.fetch_add(1, Ordering::SeqCst);
    self
      .mutation(self.inner.rollback_factory(factory_id, request))
      .await
  }

  async fn list_factories(&self) -> Result<Vec<Factory>> { self.inner.list_factories().await }

  async fn list_factories_excluding(&self, excluded: &[String]) -> Result<Vec<Factory>> {
    self.inner.list_factories_excluding(excluded).await
  }
}

type Backend = Faulty<LocalBackend<SqliteStore>>;

fn snapshot(value: serde_json::Value) -> ConfigSnapshot {
  match value {
    serde_json::Value::Object(map) => map,
    other => panic!("not an object: {other}"),
  }
}

/// Active `BP001` at version `versions`, factories F1..F3 unbound.
async fn seeded(versions: u32) -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let mut input = NewBlueprint::new("Dairy baseline", "dairy");
  input.blueprint_id = Some("BP001".into());
  input.config = snapshot(json!({ "productTypes": ["milk"] }));
  store.create_blueprint(input).await.unwrap();
  for n in 2..=versions {
    store
      .create_version(
        "BP001",
        NewVersion::new(ChangeType::Update, format!("revision {n}"))
          .with_config(snapshot(json!({ "productTypes": ["milk"], "rev": n }))),
      )
      .await
      .unwrap();
  }
  store.transition_blueprint("BP001", StatusAction::Publish).await.unwrap();
  for id in ["F1", "F2", "F3"] {
    store.add_factory(NewFactory::with_id(id, format!("Factory {id}"))).await.unwrap();
  }
  Arc::new(store)
}

async fn bind(store: &SqliteStore, factory_id: &str, version: u32) {
  store
    .upgrade_factory(
      factory_id,
      UpgradeRequest {
        blueprint_id:     "BP001".into(),
        target_version:   version,
        expected_version: None,
        sync_options:     SyncOptions::all_components(),
      },
    )
    .await
    .unwrap();
}

async fn applied(store: &SqliteStore, factory_id: &str) -> Option<u32> {
  store
    .list_bindings("BP001")
    .await
    .unwrap()
    .into_iter()
    .find(|b| b.factory_id == factory_id)
    .map(|b| b.applied_version)
}

fn setup(store: &Arc<SqliteStore>) -> (Arc<Backend>, Orchestrator<Backend>) {
  setup_with(Faulty::new(LocalBackend::new(Arc::clone(store))), &SyncConfig::default())
}

fn setup_with(backend: Backend, config: &SyncConfig) -> (Arc<Backend>, Orchestrator<Backend>) {
  let backend = Arc::new(backend);
  let orchestrator = Orchestrator::new(Arc::clone(&backend), config);
  (backend, orchestrator)
}

fn ids(ids: &[&str]) -> Vec<String> { ids.iter().map(|s| s.to_string()).collect() }

fn product_types() -> SyncOptions { SyncOptions::with_components([Component::ProductTypes]) }

// ─── Batch apply ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failing_factory_does_not_stop_the_batch() {
  let store = seeded(2).await;
  bind(&store, "F2", 1).await;
  let (backend, orchestrator) = setup(&store);
  backend.fail("F2");

  let mut ctx = orchestrator.load_context("BP001").await.unwrap();
  let report = orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1", "F2", "F3"]), product_types(), |_| {})
    .await
    .unwrap();

  assert_eq!((report.success_count, report.total_count), (2, 3));
  assert!(!report.all_succeeded());
  assert_eq!(backend.upgrades(), 3, "every factory attempted");

  assert_eq!(applied(&store, "F1").await, Some(2));
  assert_eq!(applied(&store, "F2").await, Some(1), "failed factory unchanged");
  assert_eq!(applied(&store, "F3").await, Some(2));

  let failed: Vec<_> = report.failures().map(|o| o.factory_id.as_str()).collect();
  assert_eq!(failed, vec!["F2"]);
  assert!(matches!(
    report.outcomes[1].outcome,
    Outcome::Failed { kind: ErrorKind::Transient, .. }
  ));
  assert_eq!(ctx.applied_version("F2"), 1);
}

#[tokio::test]
async fn applying_current_version_clears_drift() {
  let store = seeded(3).await;
  bind(&store, "F1", 1).await;
  let (_, orchestrator) = setup(&store);

  let mut ctx = orchestrator.load_context("BP001").await.unwrap();
  assert!(ctx.binding("F1").unwrap().needs_upgrade);

  let report = orchestrator
    .apply_blueprint(&mut ctx, 3, &ids(&["F1"]), product_types(), |_| {})
    .await
    .unwrap();
  assert_eq!(report.success_count, 1);

  let binding = ctx.binding("F1").unwrap();
  assert_eq!(binding.applied_version, 3);
  assert!(!binding.needs_upgrade);

  let stored = store.list_bindings("BP001").await.unwrap();
  assert_eq!(stored[0].applied_version, 3);
  assert!(!stored[0].needs_upgrade);
}

#[tokio::test]
async fn empty_selection_is_rejected_before_any_call() {
  let store = seeded(3).await;
  let (backend, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let err = orchestrator
    .apply_blueprint(&mut ctx, 3, &[], product_types(), |_| {})
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ref m) if m == "select at least one factory"));

  let err = orchestrator
    .apply_blueprint(&mut ctx, 3, &ids(&["F1"]), SyncOptions::default(), |_| {})
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ref m) if m == "select at least one option"));

  let err = orchestrator
    .apply_blueprint(&mut ctx, 9, &ids(&["F1"]), product_types(), |_| {})
    .await
    .unwrap_err();
  assert!(matches!(err, Error::VersionNotFound { version: 9, .. }));
  assert_eq!(err.kind(), ErrorKind::NotFound);

  assert_eq!(backend.upgrades(), 0);
}

#[tokio::test]
async fn apply_reaches_versions_created_after_load() {
  let store = seeded(2).await;
  let (backend, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();
  assert_eq!(ctx.current_version(), 2);

  store
    .create_version("BP001", NewVersion::new(ChangeType::Update, "late edit"))
    .await
    .unwrap();

  let report = orchestrator
    .apply_blueprint(&mut ctx, 3, &ids(&["F1"]), product_types(), |_| {})
    .await
    .unwrap();
  assert_eq!((report.success_count, report.total_count), (1, 1));
  assert_eq!(ctx.current_version(), 3);
  assert_eq!(backend.upgrades(), 1);
  assert_eq!(applied(&store, "F1").await, Some(3));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
  let store = seeded(2).await;
  let (_, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let mut events: Vec<Progress> = Vec::new();
  orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1", "F2", "F3"]), product_types(), |p| {
      events.push(p)
    })
    .await
    .unwrap();

  assert_eq!(events.len(), 6);
  assert_eq!(events[0].phase, Phase::Dispatched);
  assert!((events[0].fraction - 0.5 / 3.0).abs() < 1e-9);
  assert!(events.windows(2).all(|w| w[0].fraction <= w[1].fraction));
  let last = events.last().unwrap();
  assert_eq!((last.phase, last.completed, last.total), (Phase::Completed, 3, 3));
  assert!((last.fraction - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn duplicate_factory_ids_are_applied_once() {
  let store = seeded(2).await;
  let (backend, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let report = orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1", "F2", "F1"]), product_types(), |_| {})
    .await
    .unwrap();
  assert_eq!(report.total_count, 2);
  assert_eq!(backend.upgrades(), 2);
}

#[tokio::test]
async fn apply_never_lowers_a_binding() {
  let store = seeded(3).await;
  bind(&store, "F1", 3).await;
  let (backend, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let report = orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1", "F2"]), product_types(), |_| {})
    .await
    .unwrap();

  assert_eq!(report.success_count, 1);
  assert!(matches!(
    report.outcomes[0].outcome,
    Outcome::Failed { kind: ErrorKind::Validation, .. }
  ));
  assert_eq!(backend.upgrades(), 1, "the downgrade never left the client");
  assert_eq!(applied(&store, "F1").await, Some(3));
}

#[tokio::test]
async fn retry_after_lost_response_is_a_no_op() {
  let store = seeded(2).await;
  let (_, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  // The first attempt landed but the client never saw it.
  bind(&store, "F1", 2).await;

  let report = orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1"]), product_types(), |_| {})
    .await
    .unwrap();
  assert!(matches!(
    report.outcomes[0].outcome,
    Outcome::Applied { changed: false, .. }
  ));
  assert_eq!(store.list_binding_events("F1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn slow_calls_time_out_as_transient_and_the_batch_continues() {
  let store = seeded(2).await;
  let config = SyncConfig { call_timeout: Some(Duration::from_millis(20)), ..Default::default() };
  let backend =
    Faulty::new(LocalBackend::new(Arc::clone(&store))).with_delay(Duration::from_millis(500));
  let (backend, orchestrator) = setup_with(backend, &config);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let report = orchestrator
    .apply_blueprint(&mut ctx, 2, &ids(&["F1", "F2"]), product_types(), |_| {})
    .await
    .unwrap();
  assert_eq!((report.success_count, report.total_count), (0, 2));
  assert!(report.outcomes.iter().all(|o| matches!(
    o.outcome,
    Outcome::Failed { kind: ErrorKind::Transient, .. }
  )));
  assert_eq!(backend.upgrades(), 2);
}

#[tokio::test]
async fn concurrent_batches_never_overlap_mutations() {
  let store = seeded(2).await;
  let backend =
    Faulty::new(LocalBackend::new(Arc::clone(&store))).with_delay(Duration::from_millis(10));
  let (backend, orchestrator) = setup_with(backend, &SyncConfig::default());
  let mut first = orchestrator.load_context("BP001").await.unwrap();
  let mut second = first.clone();

  let left = ids(&["F1", "F2"]);
  let right = ids(&["F3"]);
  let (a, b) = tokio::join!(
    orchestrator.apply_blueprint(&mut first, 2, &left, product_types(), |_| {}),
    orchestrator.apply_blueprint(&mut second, 2, &right, product_types(), |_| {}),
  );
  assert_eq!(a.unwrap().success_count + b.unwrap().success_count, 3);
  assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

// ─── Batch sync ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_sync_targets_only_outdated_bindings() {
  let store = seeded(3).await;
  bind(&store, "F1", 1).await;
  bind(&store, "F2", 3).await;
  let (backend, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let report = orchestrator.batch_sync(&mut ctx, |_| {}).await.unwrap();
  assert_eq!(report.target_version, 3);
  assert_eq!((report.success_count, report.total_count), (1, 1));
  assert_eq!(report.outcomes[0].factory_id, "F1");
  assert_eq!(applied(&store, "F1").await, Some(3));
  assert_eq!(applied(&store, "F3").await, None, "unbound factories are left alone");

  let again = orchestrator.batch_sync(&mut ctx, |_| {}).await.unwrap();
  assert_eq!((again.success_count, again.total_count), (0, 0));
  assert_eq!(backend.upgrades(), 1);
}

#[tokio::test]
async fn batch_sync_sees_versions_created_after_load() {
  let store = seeded(2).await;
  bind(&store, "F1", 2).await;
  let (_, orchestrator) = setup(&store);
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();
  assert!(ctx.outdated().is_empty());

  store
    .create_version("BP001", NewVersion::new(ChangeType::Update, "late edit"))
    .await
    .unwrap();

  let report = orchestrator.batch_sync(&mut ctx, |_| {}).await.unwrap();
  assert_eq!(report.target_version, 3);
  assert_eq!(report.success_count, 1);
  assert_eq!(ctx.current_version(), 3);
}

// ─── Rollback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rollback_to_zero_frees_the_factory() {
  let store = seeded(3).await;
  bind(&store, "F1", 3).await;
  let (backend, orchestrator) = setup(&store);
  let rollback = orchestrator.rollback_controller();
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let available = query::available_factories(backend.as_ref(), "BP001").await.unwrap();
  assert!(available.iter().all(|f| f.factory_id != "F1"));

  let outcome = rollback.rollback(&mut ctx, "F1", 0, "pilot ended").await.unwrap();
  assert!(outcome.success);
  assert!(ctx.binding("F1").is_none());
  assert_eq!(applied(&store, "F1").await, None);

  let available = query::available_factories(backend.as_ref(), "BP001").await.unwrap();
  assert!(available.iter().any(|f| f.factory_id == "F1"));
}

#[tokio::test]
async fn rollback_twice_leaves_the_same_state() {
  let store = seeded(3).await;
  bind(&store, "F1", 3).await;
  let (_, orchestrator) = setup(&store);
  let rollback = orchestrator.rollback_controller();
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let first = rollback.rollback(&mut ctx, "F1", 2, "bad batch").await.unwrap();
  let second = rollback.rollback(&mut ctx, "F1", 2, "bad batch").await.unwrap();
  assert!(first.success && second.success);
  let versions = [&first, &second].map(|o| o.binding.as_ref().map(|b| b.applied_version));
  assert_eq!(versions, [Some(2), Some(2)]);
  assert_eq!(ctx.applied_version("F1"), 2);
  assert!(ctx.binding("F1").unwrap().needs_upgrade);
}

#[tokio::test]
async fn forward_rollback_is_refused_locally() {
  let store = seeded(3).await;
  bind(&store, "F1", 2).await;
  let (backend, orchestrator) = setup(&store);
  let rollback = orchestrator.rollback_controller();
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let err = rollback.rollback(&mut ctx, "F1", 3, "").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(backend.rollbacks(), 0);
  assert_eq!(applied(&store, "F1").await, Some(2));
}

#[tokio::test]
async fn rollback_of_unbound_factory_succeeds() {
  let store = seeded(1).await;
  let (_, orchestrator) = setup(&store);
  let rollback = orchestrator.rollback_controller();
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let outcome = rollback.rollback(&mut ctx, "F3", 0, "").await.unwrap();
  assert!(outcome.success);
  assert!(outcome.binding.is_none());
}

#[tokio::test]
async fn rollback_errors_propagate() {
  let store = seeded(1).await;
  let (_, orchestrator) = setup(&store);
  let rollback = orchestrator.rollback_controller();
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();

  let err = rollback.rollback(&mut ctx, "F404", 0, "").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Over HTTP ───────────────────────────────────────────────────────────────

async fn serve(store: Arc<SqliteStore>) -> String {
  let app = axum::Router::new().nest("/api", bpsync_api::api_router(store));
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  format!("http://{addr}")
}

#[tokio::test]
async fn full_rollout_over_http() {
  let store = seeded(3).await;
  bind(&store, "F1", 1).await;
  let base_url = serve(Arc::clone(&store)).await;

  let client = Arc::new(ApiClient::new(ClientConfig::new(base_url)).unwrap());
  let orchestrator = Orchestrator::new(Arc::clone(&client), &SyncConfig::default());
  let mut ctx = orchestrator.load_context("BP001").await.unwrap();
  assert_eq!(ctx.current_version(), 3);
  assert_eq!(ctx.outdated().len(), 1);

  let history = query::version_history(client.as_ref(), "BP001").await.unwrap();
  assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![3, 2, 1]);

  let forward = query::compare_versions(client.as_ref(), "BP001", 1, 2).await.unwrap();
  let backward = query::compare_versions(client.as_ref(), "BP001", 2, 1).await.unwrap();
  assert_eq!(forward.added_fields, backward.removed_fields);

  let report = orchestrator
    .apply_blueprint(&mut ctx, 3, &ids(&["F1", "F2"]), product_types(), |_| {})
    .await
    .unwrap();
  assert_eq!(report.success_count, 2);
  assert_eq!(applied(&store, "F2").await, Some(3));

  let rollback = orchestrator.rollback_controller();
  rollback.rollback(&mut ctx, "F2", 0, "wrong site").await.unwrap();
  let available = query::available_factories(client.as_ref(), "BP001").await.unwrap();
  let available: Vec<&str> = available.iter().map(|f| f.factory_id.as_str()).collect();
  assert_eq!(available, vec!["F2", "F3"]);

  let events = client.list_binding_events("F2").await.unwrap();
  assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn exclusion_survives_ids_with_commas_and_spaces() {
  let store = seeded(1).await;
  for id in ["A,B", "A", " B"] {
    store.add_factory(NewFactory::with_id(id, format!("Factory {id}"))).await.unwrap();
  }
  let base_url = serve(Arc::clone(&store)).await;
  let client = ApiClient::new(ClientConfig::new(base_url)).unwrap();
  let local = LocalBackend::new(Arc::clone(&store));

  let excluded = ids(&["A,B", " B"]);
  let names = |factories: Vec<Factory>| -> Vec<String> {
    factories.into_iter().map(|f| f.factory_id).collect()
  };
  let remote = names(client.list_factories_excluding(&excluded).await.unwrap());
  let in_process = names(local.list_factories_excluding(&excluded).await.unwrap());

  assert_eq!(remote, in_process);
  assert!(remote.contains(&"A".to_string()));
  assert!(!remote.iter().any(|id| id == "A,B" || id == " B"));
}

#[tokio::test]
async fn http_errors_keep_their_kind() {
  let store = seeded(1).await;
  let base_url = serve(store).await;
  let client = ApiClient::new(ClientConfig::new(base_url)).unwrap();

  let err = client.get_blueprint("BP404").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = client.compare_versions("BP001", 1, 9).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unreachable_server_is_transient() {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let client = ApiClient::new(
    ClientConfig::new(format!("http://{addr}")).with_timeout(Duration::from_secs(2)),
  )
  .unwrap();
  let err = client.list_factories().await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Transient);
}
