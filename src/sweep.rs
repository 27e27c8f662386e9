//! Background maintenance sweep.
//!
//! Periodically selects eligible leads and drives a batch enrichment run,
//! and every few cycles recomputes the duplicate-edge set. The worker is
//! the single writer for duplicate edges, so the full-table swap never
//! races with itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use enrichment_core::batch::{BatchCoordinator, BatchOutcome, MAX_BATCH_SIZE};
use enrichment_core::dedup::detect_duplicates;
use enrichment_core::ports::LeadRepository;
use enrichment_core::Result;

/// Dedup recomputation runs once every N sweep cycles.
const DEDUP_EVERY_CYCLES: u64 = 10;

pub struct SweepWorker {
    repo: Arc<dyn LeadRepository>,
    coordinator: Arc<BatchCoordinator>,
    interval: Duration,
    batch_size: i64,
    concurrency: usize,
}

impl SweepWorker {
    pub fn new(
        repo: Arc<dyn LeadRepository>,
        coordinator: Arc<BatchCoordinator>,
        interval: Duration,
        batch_size: i64,
        concurrency: usize,
    ) -> Self {
        // The coordinator rejects oversized batches outright; clamp here so
        // a generous env setting degrades instead of failing every sweep.
        let batch_size = batch_size.min(MAX_BATCH_SIZE as i64);
        Self {
            repo,
            coordinator,
            interval,
            batch_size,
            concurrency,
        }
    }

    /// Run until the shutdown signal flips.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "sweep worker started");
        let mut cycle = 0u64;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.sweep_once(shutdown_rx.clone()).await {
                Ok(outcome) => tracing::info!(
                    total = outcome.summary.total,
                    enriched = outcome.summary.enriched,
                    skipped = outcome.summary.skipped,
                    failed = outcome.summary.failed,
                    "sweep cycle finished"
                ),
                Err(e) => tracing::error!(error = %e, "sweep cycle failed"),
            }

            cycle += 1;
            if cycle % DEDUP_EVERY_CYCLES == 0 {
                if let Err(e) = self.dedup_once().await {
                    tracing::error!(error = %e, "duplicate sweep failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
        tracing::info!("sweep worker shutting down");
    }

    /// One enrichment pass over the currently eligible leads.
    pub async fn sweep_once(&self, cancel: watch::Receiver<bool>) -> Result<BatchOutcome> {
        let ids = self.repo.list_eligible_leads(self.batch_size).await?;
        tracing::debug!(candidates = ids.len(), "sweep selected candidates");
        self.coordinator.run(&ids, self.concurrency, cancel).await
    }

    /// Recompute and atomically replace the duplicate-edge set.
    pub async fn dedup_once(&self) -> Result<usize> {
        let leads = self.repo.list_all_leads().await?;
        let edges = detect_duplicates(&leads);
        self.repo.replace_duplicate_edges(&edges).await?;
        tracing::info!(leads = leads.len(), edges = edges.len(), "duplicate sweep finished");
        Ok(edges.len())
    }
}
