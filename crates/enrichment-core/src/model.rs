//! Domain records for leads and their enrichment lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::EnrichmentStatus;

/// A prospective customer record ingested from C2S or an ad-lead form.
///
/// Immutable after ingestion except `normalized_phone`, which maintenance
/// may recompute (e.g. after a country-prefix misdetection is fixed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// External id from the source system. Stable, primary key.
    pub id: String,
    /// Phone exactly as received, formatting characters and all.
    pub raw_phone: Option<String>,
    /// Digit-only local-format phone derived by the normalizer.
    pub normalized_phone: Option<String>,
    pub name: String,
    pub email: Option<String>,
    /// CPF supplied by the source payload, when present.
    pub cpf: Option<String>,
    /// Source channel (e.g. "c2s", "facebook_ads").
    pub source_channel: Option<String>,
    /// Pass-through seller metadata; not used by any core decision.
    pub seller_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One-to-one enrichment state for a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub lead_id: String,
    pub status: EnrichmentStatus,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Tax id resolved for this lead, once known.
    pub cpf: Option<String>,
    /// Which query key produced the cpf ("cpf" or "phone").
    pub cpf_source: Option<String>,
    /// Raw upstream lookup payload, kept opaque for audit.
    pub raw_response: Option<serde_json::Value>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl EnrichmentRecord {
    /// Fresh record for a lead entering the pipeline.
    pub fn new(lead_id: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            status: EnrichmentStatus::Unenriched,
            retry_count: 0,
            last_retry_at: None,
            last_error: None,
            cpf: None,
            cpf_source: None,
            raw_response: None,
            enriched_at: None,
        }
    }
}

/// How two leads were matched as duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Phone,
    Email,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Phone => "phone",
            MatchType::Email => "email",
        }
    }
}

/// Directed duplicate relation: `lead_id` duplicates `canonical_lead_id`.
///
/// The canonical lead is always the earliest-created member of the match
/// group for the given match type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEdge {
    pub lead_id: String,
    pub canonical_lead_id: String,
    pub match_type: MatchType,
    pub match_value: String,
}

/// Parsed lookup-service profile for a tax-id-matched person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupProfile {
    pub cpf: String,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub mother_name: Option<String>,
    pub income: Option<f64>,
    pub income_range: Option<String>,
    pub purchasing_power_code: Option<i32>,
    pub phones: Vec<String>,
    pub addresses: Vec<serde_json::Value>,
    /// Full upstream payload as received.
    pub raw: serde_json::Value,
}

impl LookupProfile {
    /// Basic identity present: cpf plus a name.
    pub fn has_identity(&self) -> bool {
        !self.cpf.is_empty() && self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// At least one economic field populated.
    pub fn has_economic_data(&self) -> bool {
        self.income.is_some() || self.income_range.is_some() || self.purchasing_power_code.is_some()
    }
}
