//! Client connection settings: flags, then the config file, then defaults.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use bpsync_client::{ClientConfig, SyncConfig};
use serde::Deserialize;

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
  pub url:        Option<String>,
  pub timeout_ms: Option<u64>,
}

impl ConfigFile {
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let Some(path) = path else {
      return Ok(Self::default());
    };
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

/// Flags (and their env fallbacks) override the file, which overrides
/// [`ClientConfig::default`].
pub fn resolve(url: Option<String>, timeout_ms: Option<u64>, file: ConfigFile) -> ClientConfig {
  let defaults = ClientConfig::default();
  ClientConfig {
    base_url: url.or(file.url).unwrap_or(defaults.base_url),
    timeout:  timeout_ms
      .or(file.timeout_ms)
      .map(Duration::from_millis)
      .unwrap_or(defaults.timeout),
  }
}

/// Mutations are bounded by the same timeout as each HTTP request.
pub fn sync_config(client: &ClientConfig) -> SyncConfig {
  SyncConfig { call_timeout: Some(client.timeout), ..SyncConfig::default() }
}
