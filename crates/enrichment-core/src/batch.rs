//! Bounded-concurrency batch enrichment coordinator.
//!
//! Drives lookup attempts across a batch of leads: per lead it re-reads the
//! enrichment record, applies the phone gate and the retry scheduler, runs
//! the lookup if eligible, and feeds the outcome back through the state
//! machine. Attempts fan out under a semaphore so the configured limit is
//! never exceeded in flight, and one lead's failure never aborts the rest.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{EnrichmentError, Result};
use crate::model::EnrichmentRecord;
use crate::phone::{check_phone, normalize_phone, PhoneCheck};
use crate::ports::{LeadRepository, LookupOutcome, LookupQuery, LookupService};
use crate::retry::{check_eligibility, Eligibility, SkipReason};
use crate::state::{self, EnrichmentStatus};

/// Hard upper bound on batch size; larger inputs are rejected up front.
pub const MAX_BATCH_SIZE: usize = 100;

/// Aggregate counts for one batch run. `enriched + skipped + failed == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-lead result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct LeadResult {
    pub lead_id: String,
    /// Final status, when the record was read or written.
    pub status: Option<EnrichmentStatus>,
    pub skip_reason: Option<SkipReason>,
    pub error: Option<String>,
}

impl LeadResult {
    fn enriched(lead_id: String, status: EnrichmentStatus) -> Self {
        Self {
            lead_id,
            status: Some(status),
            skip_reason: None,
            error: None,
        }
    }

    fn skipped(lead_id: String, reason: SkipReason, status: Option<EnrichmentStatus>) -> Self {
        Self {
            lead_id,
            status,
            skip_reason: Some(reason),
            error: None,
        }
    }

    fn failure(
        lead_id: String,
        status: Option<EnrichmentStatus>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            lead_id,
            status,
            skip_reason: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub results: Vec<LeadResult>,
}

/// Coordinates concurrent enrichment attempts against the repository and
/// the lookup service.
pub struct BatchCoordinator {
    repo: Arc<dyn LeadRepository>,
    lookup: Arc<dyn LookupService>,
}

impl BatchCoordinator {
    pub fn new(repo: Arc<dyn LeadRepository>, lookup: Arc<dyn LookupService>) -> Self {
        Self { repo, lookup }
    }

    /// Run enrichment over `lead_ids` with at most `concurrency` lookups in
    /// flight. Produces exactly one result entry per input id.
    ///
    /// Once `cancel` flips to true no new attempts are dispatched; attempts
    /// already in flight run to completion. An oversized id list is rejected
    /// before any work starts.
    pub async fn run(
        &self,
        lead_ids: &[String],
        concurrency: usize,
        cancel: watch::Receiver<bool>,
    ) -> Result<BatchOutcome> {
        if lead_ids.len() > MAX_BATCH_SIZE {
            return Err(EnrichmentError::BatchTooLarge {
                size: lead_ids.len(),
                limit: MAX_BATCH_SIZE,
            });
        }

        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            total = lead_ids.len(),
            concurrency,
            "batch enrichment run started"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set: JoinSet<(usize, LeadResult)> = JoinSet::new();
        let mut slots: Vec<Option<LeadResult>> = vec![None; lead_ids.len()];

        for (idx, lead_id) in lead_ids.iter().enumerate() {
            if *cancel.borrow() {
                slots[idx] = Some(LeadResult::skipped(
                    lead_id.clone(),
                    SkipReason::Cancelled,
                    None,
                ));
                continue;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| anyhow!(e))?;
            // A cancellation may have arrived while waiting for a permit.
            if *cancel.borrow() {
                slots[idx] = Some(LeadResult::skipped(
                    lead_id.clone(),
                    SkipReason::Cancelled,
                    None,
                ));
                continue;
            }
            let repo = Arc::clone(&self.repo);
            let lookup = Arc::clone(&self.lookup);
            let id = lead_id.clone();
            join_set.spawn(async move {
                let result = enrich_one(repo, lookup, id).await;
                drop(permit);
                (idx, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => tracing::warn!(%run_id, error = %e, "batch task aborted"),
            }
        }

        let results: Vec<LeadResult> = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    LeadResult::failure(lead_ids[idx].clone(), None, "task aborted")
                })
            })
            .collect();

        let mut summary = BatchSummary {
            total: results.len(),
            ..BatchSummary::default()
        };
        for result in &results {
            if result.skip_reason.is_some() {
                summary.skipped += 1;
            } else if result.error.is_some() {
                summary.failed += 1;
            } else {
                summary.enriched += 1;
            }
        }

        tracing::info!(
            %run_id,
            total = summary.total,
            enriched = summary.enriched,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch enrichment run finished"
        );
        Ok(BatchOutcome { summary, results })
    }

    /// Enrich a single lead outside any batch (webhook-triggered path).
    pub async fn enrich_lead(&self, lead_id: &str) -> LeadResult {
        enrich_one(
            Arc::clone(&self.repo),
            Arc::clone(&self.lookup),
            lead_id.to_string(),
        )
        .await
    }
}

/// One attempt: read-modify-write on the lead's own record; never returns
/// an error upward, so a bad lead cannot poison its batch.
async fn enrich_one(
    repo: Arc<dyn LeadRepository>,
    lookup: Arc<dyn LookupService>,
    lead_id: String,
) -> LeadResult {
    match try_enrich(repo, lookup, &lead_id).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(lead_id = %lead_id, error = %e, "enrichment attempt errored");
            LeadResult::failure(lead_id, None, e.to_string())
        }
    }
}

async fn try_enrich(
    repo: Arc<dyn LeadRepository>,
    lookup: Arc<dyn LookupService>,
    lead_id: &str,
) -> Result<LeadResult> {
    let Some(lead) = repo.get_lead(lead_id).await? else {
        return Ok(LeadResult::failure(
            lead_id.to_string(),
            None,
            "lead not found",
        ));
    };
    let mut record = repo
        .get_enrichment_record(lead_id)
        .await?
        .unwrap_or_else(|| EnrichmentRecord::new(lead_id));

    let normalized = lead
        .normalized_phone
        .clone()
        .or_else(|| lead.raw_phone.as_deref().and_then(normalize_phone))
        .unwrap_or_default();

    // The gate runs ahead of scheduling for every record that is still
    // advanceable; terminal records were gated when they got there.
    if record.status.is_retryable() {
        if let PhoneCheck::Invalid(reason) = check_phone(&normalized) {
            state::reject_phone(&mut record, &reason, lead.raw_phone.as_deref());
            repo.upsert_enrichment_record(&record).await?;
            return Ok(LeadResult::skipped(
                lead_id.to_string(),
                SkipReason::InvalidPhone,
                Some(record.status),
            ));
        }
    }

    let now = Utc::now();
    match check_eligibility(&record, now) {
        Eligibility::Skip(reason) => {
            // A retryable record seen with its retries spent fails out here.
            if reason == SkipReason::MaxRetriesExceeded && state::mark_exhausted(&mut record) {
                repo.upsert_enrichment_record(&record).await?;
            }
            Ok(LeadResult::skipped(
                lead_id.to_string(),
                reason,
                Some(record.status),
            ))
        }
        Eligibility::Eligible => {
            let query = match record.cpf.clone().or_else(|| lead.cpf.clone()) {
                Some(cpf) => LookupQuery::Cpf(cpf),
                None => LookupQuery::Phone(normalized),
            };
            let outcome = lookup.lookup(&query).await;
            let error = match &outcome {
                LookupOutcome::Found(_) => None,
                LookupOutcome::NotFound => Some("no profile matched the query".to_string()),
                LookupOutcome::RateLimited => Some("upstream rate limit".to_string()),
                LookupOutcome::Transient(e) => Some(e.clone()),
            };
            state::apply_outcome(&mut record, outcome, query.source_tag(), now);
            repo.upsert_enrichment_record(&record).await?;
            Ok(match error {
                None => LeadResult::enriched(lead_id.to_string(), record.status),
                Some(msg) => LeadResult::failure(lead_id.to_string(), Some(record.status), msg),
            })
        }
    }
}
