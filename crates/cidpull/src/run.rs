//! The retrieval run: bootstrap once, then every batch in order.

use crate::{load_identifiers, RunConfig};
use cidpull_api::*;
use cidpull_core::*;
use tokio_util::sync::CancellationToken;

/// Everything a completed run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Peers touched while bootstrapping.
    pub bootstrap: BootstrapReport,

    /// Batches planned.
    pub batch_count: usize,

    /// Batches run to completion. Less than `batch_count` only if the
    /// run was cancelled.
    pub completed_batches: usize,

    /// Identifiers in batches that were never started.
    pub skipped: usize,

    /// One outcome per identifier of every completed batch, in input
    /// order.
    pub outcomes: Vec<FetchOutcome>,

    /// The most fetches that were in flight at once.
    pub peak_in_flight: usize,
}

impl RunReport {
    /// Every failed identifier with its cause.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &FetchError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.token(), e)))
    }

    /// Count of retrieved objects.
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fetched()).count()
    }

    /// Count of failed identifiers.
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Total bytes of every retrieved object.
    pub fn total_bytes(&self) -> u64 {
        self.outcomes.iter().filter_map(FetchOutcome::size).sum()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Fetched {} of {} CIDs ({} bytes) in {} of {} batches",
            self.success_count(),
            self.outcomes.len() + self.skipped,
            self.total_bytes(),
            self.completed_batches,
            self.batch_count,
        )?;
        for (peer, err) in &self.bootstrap.unreachable {
            writeln!(f, "Unreachable peer {peer}: {err}")?;
        }
        for (token, err) in self.failures() {
            writeln!(f, "Error fetching CID {token}: {err}")?;
        }
        Ok(())
    }
}

/// Drives a full retrieval run against a content node.
#[derive(Debug)]
pub struct RunOrchestrator {
    config: RunConfig,
    node: DynContentNode,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    /// Construct a new RunOrchestrator.
    pub fn new(config: RunConfig, node: DynContentNode) -> Self {
        Self {
            config,
            node,
            cancel: CancellationToken::new(),
        }
    }

    /// A token that cancels this run when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load the identifier list from the configured source, then [Self::run].
    pub async fn run_from_source(&self) -> PullResult<RunReport> {
        let identifiers = load_identifiers(
            &self.config.cids_source,
            self.config.source_timeout(),
        )
        .await?;
        self.run(identifiers).await
    }

    /// Bootstrap, plan and fetch every identifier.
    ///
    /// Returns an error only for setup failures: malformed peers or an
    /// unreachable bootstrap peer under [BootstrapPolicy::FailFast].
    /// Individual fetch failures are collected in the report.
    pub async fn run(&self, identifiers: Vec<String>) -> PullResult<RunReport> {
        let peers = peer::resolve_peers(&self.config.peers)?;

        let bootstrap = PeerBootstrapper::new(
            self.node.clone(),
            self.config.bootstrap.clone(),
            self.cancel.clone(),
        )
        .bootstrap(&peers)
        .await?;

        let capacity = self.config.concurrency;
        let batches = plan_batches(&identifiers, capacity);
        let batch_count = batches.len();
        tracing::info!(
            cids = identifiers.len(),
            batch_count,
            capacity,
            "planned batches"
        );

        let gate = ConcurrencyGate::new(capacity);
        let coordinator = BatchCoordinator::new(FetchWorker::new(
            self.node.clone(),
            gate.clone(),
            self.config.fetch.clone(),
            self.cancel.clone(),
        ));

        let mut report = RunReport {
            bootstrap,
            batch_count,
            outcomes: Vec::with_capacity(identifiers.len()),
            ..Default::default()
        };

        for (index, batch) in batches.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.skipped += batch.len();
                continue;
            }

            tracing::info!(
                batch = index + 1,
                of = batch_count,
                size = batch.len(),
                "processing batch"
            );

            let outcomes = coordinator.run_batch(batch).await;
            let failed = outcomes.iter().filter(|o| !o.is_fetched()).count();
            tracing::info!(
                batch = index + 1,
                failed,
                "finished processing batch"
            );

            report.outcomes.extend(outcomes);
            report.completed_batches += 1;
        }

        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "run cancelled");
        }

        report.peak_in_flight = gate.peak();

        for (token, err) in report.failures() {
            tracing::error!(%token, %err, "error fetching cid");
        }
        tracing::info!(
            fetched = report.success_count(),
            failed = report.failure_count(),
            bytes = report.total_bytes(),
            "run complete"
        );

        Ok(report)
    }
}
