//! Client-side blueprint rollout.
//!
//! Everything here talks to the platform through
//! [`bpsync_core::backend::SyncBackend`], either over HTTP ([`ApiClient`]) or
//! in-process ([`LocalBackend`]).
//!
//! ```rust,ignore
//! let backend = Arc::new(ApiClient::new(ClientConfig::new("http://localhost:8080"))?);
//! let orchestrator = Orchestrator::new(backend, &SyncConfig::default());
//! let mut ctx = orchestrator.load_context("BP001").await?;
//! let report = orchestrator.batch_sync(&mut ctx, |p| eprintln!("{:.0}%", p.fraction * 100.0)).await?;
//! ```

pub mod context;
pub mod http;
pub mod local;
pub mod orchestrator;
pub mod query;
pub mod queue;
pub mod rollback;

pub use context::BlueprintSyncContext;
pub use http::{ApiClient, ClientConfig};
pub use local::LocalBackend;
pub use orchestrator::{ApplyReport, FactoryOutcome, Orchestrator, Outcome, Phase, Progress};
pub use queue::{MutationQueue, SyncConfig};
pub use rollback::RollbackController;

#[cfg(test)]
mod tests;
