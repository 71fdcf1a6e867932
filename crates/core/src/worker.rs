//! Fetching a single identifier through the concurrency gate.

use crate::{ConcurrencyGate, FetchOutcome};
use backon::BackoffBuilder;
use cidpull_api::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// FetchWorker configuration types.
pub mod config {
    use std::time::Duration;

    /// Configuration parameters for [FetchWorker](super::FetchWorker).
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct FetchConfig {
        /// Deadline for a single retrieval attempt. Default: 60s.
        pub fetch_timeout_ms: u32,
        /// How many times a failed retrieval is retried. Default: 2.
        pub max_retries: usize,
        /// Delay before the first retry. Default: 500ms.
        pub min_retry_delay_ms: u32,
        /// Upper bound of the exponential retry delay. Default: 5s.
        pub max_retry_delay_ms: u32,
    }

    impl Default for FetchConfig {
        fn default() -> Self {
            Self {
                fetch_timeout_ms: 60_000,
                max_retries: 2,
                min_retry_delay_ms: 500,
                max_retry_delay_ms: 5_000,
            }
        }
    }

    impl FetchConfig {
        /// Get the fetch timeout as a [Duration].
        pub fn fetch_timeout(&self) -> Duration {
            Duration::from_millis(self.fetch_timeout_ms as u64)
        }

        /// Get the first retry delay as a [Duration].
        pub fn min_retry_delay(&self) -> Duration {
            Duration::from_millis(self.min_retry_delay_ms as u64)
        }

        /// Get the retry delay cap as a [Duration].
        pub fn max_retry_delay(&self) -> Duration {
            Duration::from_millis(self.max_retry_delay_ms as u64)
        }
    }
}

pub use config::*;

/// Fetches identifiers one at a time, holding a gate slot for the
/// duration of each retrieval attempt.
///
/// Cloning is cheap; every clone shares the node, gate and cancel token.
#[derive(Debug, Clone)]
pub struct FetchWorker {
    node: DynContentNode,
    gate: ConcurrencyGate,
    config: Arc<FetchConfig>,
    cancel: CancellationToken,
}

impl FetchWorker {
    /// Construct a new FetchWorker.
    pub fn new(
        node: DynContentNode,
        gate: ConcurrencyGate,
        config: FetchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node,
            gate,
            config: Arc::new(config),
            cancel,
        }
    }

    /// The gate this worker admits fetches through.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Decode and fetch one identifier token. Always yields exactly one
    /// outcome.
    pub async fn fetch(&self, token: String) -> FetchOutcome {
        let id = match token.parse::<ContentId>() {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(%token, ?err, "could not decode cid");
                return FetchOutcome::Failed {
                    token,
                    error: FetchError::Decode(err),
                };
            }
        };

        let mut delays = backon::ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.config.min_retry_delay())
            .with_max_delay(self.config.max_retry_delay())
            .with_max_times(self.config.max_retries)
            .build();

        loop {
            let error = match self.attempt(id).await {
                Ok(size) => {
                    tracing::info!(cid = %id, size, "fetched cid");
                    return FetchOutcome::Fetched { token, id, size };
                }
                Err(error) => error,
            };

            let delay = match delays.next() {
                Some(delay) if error.is_retryable() => delay,
                _ => {
                    tracing::warn!(cid = %id, %error, "failed to fetch cid");
                    return FetchOutcome::Failed { token, error };
                }
            };

            tracing::warn!(cid = %id, %error, ?delay, "retrying fetch");

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return FetchOutcome::Failed {
                        token,
                        error: FetchError::Cancelled,
                    };
                }
                _ = tokio::time::sleep(delay) => (),
            }
        }
    }

    async fn attempt(&self, id: ContentId) -> Result<u64, FetchError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            permit = self.gate.acquire() => permit
                .map_err(|err| FetchError::Aborted(err.to_string().into()))?,
        };

        let timeout = self.config.fetch_timeout();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            res = tokio::time::timeout(timeout, self.node.get(id)) => {
                match res {
                    Err(_) => Err(FetchError::Timeout(timeout)),
                    Ok(Err(err)) => Err(err.into()),
                    Ok(Ok(object)) => Ok(object.size()),
                }
            }
        }
    }
}
