//! [`MutationQueue`]: the single worker every binding mutation goes through.
//!
//! One tokio task owns the backend's mutating side and drains a bounded
//! channel in FIFO order, so at most one `upgrade_factory` or
//! `rollback_factory` from this client is ever in flight. Callers wait on a
//! oneshot reply. Reads bypass the queue.

use std::{future::Future, sync::Arc, time::Duration};

use bpsync_core::{
  Error, Result,
  backend::SyncBackend,
  sync::{BindingResult, RollbackOutcome, RollbackRequest, UpgradeRequest},
};
use tokio::sync::{mpsc, oneshot};

/// Tuning for the client-side sync machinery.
#[derive(Debug, Clone)]
pub struct SyncConfig {
  /// Upper bound on a single mutation; exceeding it is a transient failure
  /// attributed to that factory. `None` waits indefinitely.
  pub call_timeout:   Option<Duration>,
  /// Pending mutations accepted before submitters wait.
  pub queue_capacity: usize,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      call_timeout:   Some(Duration::from_secs(30)),
      queue_capacity: 32,
    }
  }
}

enum Job {
  Upgrade {
    factory_id: String,
    request:    UpgradeRequest,
    reply:      oneshot::Sender<Result<BindingResult>>,
  },
  Rollback {
    factory_id: String,
    request:    RollbackRequest,
    reply:      oneshot::Sender<Result<RollbackOutcome>>,
  },
}

/// Handle to the mutation worker. Clones share the same worker; it stops
/// once every handle is dropped.
#[derive(Clone)]
pub struct MutationQueue {
  tx: mpsc::Sender<Job>,
}

impl MutationQueue {
  /// Spawn the worker on the current tokio runtime.
  pub fn spawn<B>(backend: Arc<B>, config: &SyncConfig) -> Self
  where
    B: SyncBackend + 'static,
  {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    tokio::spawn(run(backend, rx, config.call_timeout));
    Self { tx }
  }

  pub async fn upgrade(&self, factory_id: &str, request: UpgradeRequest) -> Result<BindingResult> {
    let (reply, rx) = oneshot::channel();
    let job = Job::Upgrade { factory_id: factory_id.to_owned(), request, reply };
    self.tx.send(job).await.map_err(|_| stopped())?;
    rx.await.map_err(|_| stopped())?
  }

  pub async fn rollback(
    &self,
    factory_id: &str,
    request: RollbackRequest,
  ) -> Result<RollbackOutcome> {
    let (reply, rx) = oneshot::channel();
    let job = Job::Rollback { factory_id: factory_id.to_owned(), request, reply };
    self.tx.send(job).await.map_err(|_| stopped())?;
    rx.await.map_err(|_| stopped())?
  }
}

fn stopped() -> Error { Error::Backend("mutation worker stopped".into()) }

async fn run<B: SyncBackend>(
  backend: Arc<B>,
  mut rx: mpsc::Receiver<Job>,
  call_timeout: Option<Duration>,
) {
  tracing::debug!("mutation worker started");
  while let Some(job) = rx.recv().await {
    match job {
      Job::Upgrade { factory_id, request, reply } => {
        let result = bounded(call_timeout, backend.upgrade_factory(&factory_id, request)).await;
        // The submitter may have given up; nothing to deliver then.
        let _ = reply.send(result);
      }
      Job::Rollback { factory_id, request, reply } => {
        let result = bounded(call_timeout, backend.rollback_factory(&factory_id, request)).await;
        let _ = reply.send(result);
      }
    }
  }
  tracing::debug!("mutation worker stopped");
}

async fn bounded<T>(
  limit: Option<Duration>,
  call: impl Future<Output = Result<T>>,
) -> Result<T> {
  let Some(limit) = limit else {
    return call.await;
  };
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(Error::Transient(format!(
      "no response within {} ms",
      limit.as_millis()
    ))),
  }
}
