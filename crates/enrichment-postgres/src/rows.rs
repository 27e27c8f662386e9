//! Row types bridging Postgres column types and the domain model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use enrichment_core::model::{EnrichmentRecord, Lead, MatchType};
use enrichment_core::state::EnrichmentStatus;

#[derive(Debug, FromRow)]
pub(crate) struct LeadRow {
    pub id: String,
    pub raw_phone: Option<String>,
    pub normalized_phone: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub source_channel: Option<String>,
    pub seller_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            raw_phone: row.raw_phone,
            normalized_phone: row.normalized_phone,
            name: row.name,
            email: row.email,
            cpf: row.cpf,
            source_channel: row.source_channel,
            seller_name: row.seller_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EnrichmentRow {
    pub lead_id: String,
    pub status: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cpf: Option<String>,
    pub cpf_source: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl TryFrom<EnrichmentRow> for EnrichmentRecord {
    type Error = String;

    fn try_from(row: EnrichmentRow) -> Result<Self, Self::Error> {
        let status = EnrichmentStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown enrichment status '{}'", row.status))?;
        Ok(EnrichmentRecord {
            lead_id: row.lead_id,
            status,
            retry_count: row.retry_count,
            last_retry_at: row.last_retry_at,
            last_error: row.last_error,
            cpf: row.cpf,
            cpf_source: row.cpf_source,
            raw_response: row.raw_response,
            enriched_at: row.enriched_at,
        })
    }
}

pub(crate) fn parse_match_type(s: &str) -> Result<MatchType, String> {
    match s {
        "phone" => Ok(MatchType::Phone),
        "email" => Ok(MatchType::Email),
        other => Err(format!("unknown match type '{other}'")),
    }
}
