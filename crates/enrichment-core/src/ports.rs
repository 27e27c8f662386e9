//! Port traits the core depends on.
//!
//! Storage and the external lookup are collaborators behind `Arc<dyn Trait>`
//! so the same coordinator logic runs against Postgres and the reqwest
//! client in production or in-memory doubles in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DuplicateEdge, EnrichmentRecord, Lead, LookupProfile};

/// Query key for the lookup service.
///
/// The service is keyed by tax id; when a lead's cpf is not yet known the
/// gated phone is used to resolve it (reverse lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    Cpf(String),
    Phone(String),
}

impl LookupQuery {
    /// Source tag persisted with the resolved cpf.
    pub fn source_tag(&self) -> &'static str {
        match self {
            LookupQuery::Cpf(_) => "cpf",
            LookupQuery::Phone(_) => "phone",
        }
    }
}

/// Outcome of one lookup attempt.
///
/// Rate limiting is a tagged variant rather than an error string so callers
/// can branch on it without message matching.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(LookupProfile),
    NotFound,
    RateLimited,
    Transient(String),
}

/// Narrow repository surface over the lead, enrichment, and duplicate
/// tables. Any storage engine satisfying it is substitutable.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>>;

    /// Insert or refresh a lead from ingestion.
    async fn upsert_lead(&self, lead: &Lead) -> Result<()>;

    async fn get_enrichment_record(&self, lead_id: &str) -> Result<Option<EnrichmentRecord>>;

    /// Upsert keyed by lead id; exactly one record per lead.
    async fn upsert_enrichment_record(&self, record: &EnrichmentRecord) -> Result<()>;

    /// Candidate lead ids for a sweep: retryable status (or no record yet)
    /// with the coarse backoff filter applied. The precise eligibility check
    /// stays in the scheduler.
    async fn list_eligible_leads(&self, limit: i64) -> Result<Vec<String>>;

    /// Full lead population, for the duplicate detector.
    async fn list_all_leads(&self) -> Result<Vec<Lead>>;

    /// Atomically replace the duplicate-edge set.
    async fn replace_duplicate_edges(&self, edges: &[DuplicateEdge]) -> Result<()>;

    /// Current duplicate-edge set, for reporting.
    async fn list_duplicate_edges(&self) -> Result<Vec<DuplicateEdge>>;
}

/// External identity/financial lookup keyed by cpf or phone.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup(&self, query: &LookupQuery) -> LookupOutcome;
}
