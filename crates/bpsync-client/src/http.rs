//! Async HTTP client wrapping the bpsync JSON API.
//!
//! Non-2xx responses are turned back into domain errors using the `kind`
//! field of the error body, falling back to the status code when the body
//! is missing or unreadable. Timeouts and connection failures are
//! [`Error::Transient`].

use std::time::Duration;

use bpsync_core::{
  Error, ErrorKind, Result,
  backend::SyncBackend,
  binding::{BindingEvent, FactoryBinding},
  blueprint::{Blueprint, BlueprintStatus},
  defaults::{WireBinding, WireCompareResult, WireVersion},
  diff::VersionCompareResult,
  factory::Factory,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
  version::BlueprintVersion,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};

/// Connection settings for the bpsync API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Server root, without the `/api` suffix.
  pub base_url: String,
  /// Applies to each request as a whole.
  pub timeout:  Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080".to_string(),
      timeout:  Duration::from_millis(30_000),
    }
  }
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), ..Default::default() }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

/// Async HTTP client for the bpsync JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct ApiClient {
  client: Client,
  base:   Url,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: Option<String>,
  kind:  Option<ErrorKind>,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .map_err(|e| Error::validation(format!("invalid base url {:?}: {e}", config.base_url)))?;
    if base.cannot_be_a_base() {
      return Err(Error::validation(format!("{:?} cannot be a base url", config.base_url)));
    }
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Backend(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, base })
  }

  /// `<base>/api/<segments...>`, each segment percent-encoded.
  fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().push("api").extend(segments);
    }
    url
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = req.send().await.map_err(|e| transport_error(what, e))?;
    let status = resp.status();
    if status.is_success() {
      return resp
        .json()
        .await
        .map_err(|e| Error::Backend(format!("{what}: unreadable response: {e}")));
    }

    let body = resp.text().await.unwrap_or_default();
    let err = status_error(status, &body);
    tracing::debug!(%status, error = %err, "{what} failed");
    Err(err)
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  /// `GET /api/blueprints[?status=<status>]`
  pub async fn list_blueprints(&self, status: Option<BlueprintStatus>) -> Result<Vec<Blueprint>> {
    let mut req = self.client.get(self.url(&["blueprints"]));
    if let Some(status) = status {
      req = req.query(&[("status", status.as_str())]);
    }
    self.send(req, "GET /blueprints").await
  }

  /// `GET /api/factories/:id/events`
  pub async fn list_binding_events(&self, factory_id: &str) -> Result<Vec<BindingEvent>> {
    let req = self.client.get(self.url(&["factories", factory_id, "events"]));
    self.send(req, "GET /factories/:id/events").await
  }
}

fn transport_error(what: &str, e: reqwest::Error) -> Error {
  if e.is_builder() {
    Error::validation(format!("{what}: {e}"))
  } else if e.is_timeout() {
    Error::Transient(format!("{what}: timed out"))
  } else {
    Error::Transient(format!("{what}: {e}"))
  }
}

/// Rebuild the domain error for a non-2xx response.
fn status_error(status: StatusCode, body: &str) -> Error {
  let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
  let (message, kind) = match parsed {
    Some(ErrorBody { error, kind }) => (error, kind),
    None => (None, None),
  };
  let kind = kind.unwrap_or_else(|| kind_for_status(status));
  let message = message
    .or_else(|| Some(body.trim().to_owned()).filter(|b| !b.is_empty()))
    .unwrap_or_else(|| status.to_string());
  Error::remote(kind, message)
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
  match status {
    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
    StatusCode::NOT_FOUND => ErrorKind::NotFound,
    StatusCode::CONFLICT => ErrorKind::Conflict,
    StatusCode::REQUEST_TIMEOUT
    | StatusCode::TOO_MANY_REQUESTS
    | StatusCode::BAD_GATEWAY
    | StatusCode::SERVICE_UNAVAILABLE
    | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Transient,
    s if s.is_client_error() => ErrorKind::Validation,
    _ => ErrorKind::Internal,
  }
}

// ─── SyncBackend impl ────────────────────────────────────────────────────────

impl SyncBackend for ApiClient {
  async fn get_blueprint(&self, blueprint_id: &str) -> Result<Blueprint> {
    let req = self.client.get(self.url(&["blueprints", blueprint_id]));
    self.send(req, "GET /blueprints/:id").await
  }

  async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
    let req = self.client.get(self.url(&["blueprints", blueprint_id, "versions"]));
    let wire: Vec<WireVersion> = self.send(req, "GET /blueprints/:id/versions").await?;
    let mut versions = wire
      .into_iter()
      .map(|w| w.resolve(blueprint_id))
      .collect::<Result<Vec<_>>>()?;
    versions.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(versions)
  }

  async fn compare_versions(
    &self,
    blueprint_id: &str,
    from: u32,
    to: u32,
  ) -> Result<VersionCompareResult> {
    let req = self
      .client
      .get(self.url(&["blueprints", blueprint_id, "compare"]))
      .query(&[("from", from), ("to", to)]);
    let wire: WireCompareResult = self.send(req, "GET /blueprints/:id/compare").await?;
    Ok(wire.into())
  }

  async fn list_bindings(&self, blueprint_id: &str) -> Result<Vec<FactoryBinding>> {
    let req = self.client.get(self.url(&["blueprints", blueprint_id, "bindings"]));
    let wire: Vec<WireBinding> = self.send(req, "GET /blueprints/:id/bindings").await?;
    wire.into_iter().map(|w| w.resolve(blueprint_id)).collect()
  }

  async fn upgrade_factory(
    &self,
    factory_id: &str,
    request: UpgradeRequest,
  ) -> Result<BindingResult> {
    let req = self
      .client
      .post(self.url(&["factories", factory_id, "upgrade"]))
      .json(&request);
    self.send(req, "POST /factories/:id/upgrade").await
  }

  async fn rollback_factory(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> Result<RollbackOutcome> {
    let req = self
      .client
      .post(self.url(&["factories", factory_id, "rollback"]))
      .json(&request);
    self.send(req, "POST /factories/:id/rollback").await
  }

  async fn list_factories(&self) -> Result<Vec<Factory>> {
    let req = self.client.get(self.url(&["factories"]));
    self.send(req, "GET /factories").await
  }

  async fn list_factories_excluding(&self, excluded: &[String]) -> Result<Vec<Factory>> {
    let params: Vec<(&str, &str)> = excluded.iter().map(|id| ("exclude", id.as_str())).collect();
    let req = self.client.get(self.url(&["factories"])).query(&params);
    self.send(req, "GET /factories").await
  }
}
