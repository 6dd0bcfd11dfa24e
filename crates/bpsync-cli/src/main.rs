//! `bpsync`: command-line client for blueprint rollout.
//!
//! # Usage
//!
//! ```text
//! bpsync --url http://localhost:8080 versions BP001
//! bpsync apply BP001 --version 3 --factory F1 --factory F2 --component productTypes
//! bpsync sync BP001
//! bpsync rollback BP001 F1 --to 0 --reason "pilot ended"
//! bpsync --config ~/.config/bpsync/config.toml history F1
//! ```

mod commands;
mod config;
mod output;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use bpsync_client::ApiClient;
use bpsync_core::{blueprint::BlueprintStatus, sync::Component};
use clap::{Parser, Subcommand, ValueEnum};
use output::Output;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bpsync", about = "Roll blueprint versions out to factories")]
struct Args {
  /// Path to a TOML config file (url, timeout_ms).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the bpsync server (default: http://localhost:8080).
  #[arg(long, env = "BPSYNC_URL")]
  url: Option<String>,

  /// Per-request timeout in milliseconds (default: 30000).
  #[arg(long, env = "BPSYNC_TIMEOUT_MS", value_name = "MS")]
  timeout_ms: Option<u64>,

  /// Print results as JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List blueprints.
  Blueprints {
    #[arg(long, value_enum)]
    status: Option<StatusFilter>,
  },

  /// Version history of a blueprint, newest first.
  Versions { blueprint: String },

  /// Factories bound to a blueprint, with drift.
  Bindings { blueprint: String },

  /// Factories free to take a blueprint.
  Available { blueprint: String },

  /// Field-level difference between two versions.
  Compare { blueprint: String, from: u32, to: u32 },

  /// Apply a version to the given factories, one at a time.
  Apply {
    blueprint: String,

    /// Version to apply; at most the blueprint's current version.
    #[arg(long)]
    version: u32,

    /// Factory to apply to; repeat for several.
    #[arg(long = "factory", value_name = "ID", required = true)]
    factories: Vec<String>,

    /// Section to push; repeat for several. Defaults to every section.
    #[arg(long = "component", value_name = "NAME")]
    components: Vec<Component>,

    #[arg(long)]
    full_sync: bool,

    #[arg(long)]
    auto_sync: bool,

    #[arg(long)]
    notify_admin: bool,
  },

  /// Upgrade every outdated binding to the current version.
  Sync { blueprint: String },

  /// Roll one factory back to an earlier version; `--to 0` unbinds it.
  Rollback {
    blueprint: String,
    factory:   String,

    #[arg(long)]
    to: u32,

    #[arg(long, default_value = "")]
    reason: String,
  },

  /// Binding events of a factory, newest first.
  History { factory: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusFilter {
  Draft,
  Active,
  Inactive,
}

impl From<StatusFilter> for BlueprintStatus {
  fn from(status: StatusFilter) -> Self {
    match status {
      StatusFilter::Draft => Self::Draft,
      StatusFilter::Active => Self::Active,
      StatusFilter::Inactive => Self::Inactive,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
  let args = Args::parse();

  // Diagnostics share stderr with progress; stdout carries results only.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let file_cfg = config::ConfigFile::load(args.config.as_deref())?;
  let client_config = config::resolve(args.url, args.timeout_ms, file_cfg);
  let sync_config = config::sync_config(&client_config);
  let base_url = client_config.base_url.clone();
  let client = ApiClient::new(client_config)
    .with_context(|| format!("invalid server URL {base_url}"))?;

  commands::run(args.command, Arc::new(client), sync_config, Output::new(args.json)).await
}
