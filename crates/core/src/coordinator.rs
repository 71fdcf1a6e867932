//! Running one batch of fetches to completion.

use crate::{FetchOutcome, FetchWorker};
use cidpull_api::*;

/// Runs every identifier of a batch concurrently and waits for all of
/// them before returning.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    worker: FetchWorker,
}

impl BatchCoordinator {
    /// Construct a new BatchCoordinator.
    pub fn new(worker: FetchWorker) -> Self {
        Self { worker }
    }

    /// The worker used for each identifier.
    pub fn worker(&self) -> &FetchWorker {
        &self.worker
    }

    /// Fetch every identifier of `batch`, one task per identifier.
    ///
    /// Returns exactly one outcome per identifier, in batch order.
    /// Individual failures never cut the batch short.
    pub async fn run_batch(&self, batch: Vec<String>) -> Vec<FetchOutcome> {
        let (tokens, tasks): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .map(|token| {
                let worker = self.worker.clone();
                let task = tokio::task::spawn({
                    let token = token.clone();
                    async move { worker.fetch(token).await }
                });
                (token, task)
            })
            .unzip();

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .zip(tokens)
            .map(|(res, token)| match res {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(%token, ?err, "fetch task failed");
                    FetchOutcome::Failed {
                        token,
                        error: FetchError::Aborted(err.to_string().into()),
                    }
                }
            })
            .collect()
    }
}
