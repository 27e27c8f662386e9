//! Lead ingestion from C2S webhook events and pull pages.
//!
//! The core consumes only the customer phone/email/name and the lead id;
//! everything else in the payload is pass-through metadata stored on the
//! lead row.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use enrichment_core::model::{EnrichmentRecord, Lead};
use enrichment_core::phone::normalize_phone;
use enrichment_core::ports::LeadRepository;
use enrichment_core::state::{self, EnrichmentStatus};

/// Hook actions that carry a lead worth ingesting.
const INGESTED_EVENTS: &[&str] = &["on_create_lead", "on_update_lead", "on_lead_form"];

/// Event envelope as delivered by the C2S webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct C2sWebhookEvent {
    pub event: String,
    pub lead: C2sLeadPayload,
}

impl C2sWebhookEvent {
    /// Close events only flag CRM-side bookkeeping; they carry nothing the
    /// pipeline acts on.
    pub fn is_ingestible(&self) -> bool {
        INGESTED_EVENTS.contains(&self.event.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct C2sLeadPayload {
    pub id: String,
    pub customer: C2sCustomer,
    #[serde(default)]
    pub seller: Option<C2sSeller>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct C2sCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct C2sSeller {
    pub name: String,
}

/// Map a payload to a domain lead, deriving the normalized phone.
pub fn lead_from_payload(payload: &C2sLeadPayload) -> Lead {
    let raw_phone = payload.customer.phone.clone();
    let normalized_phone = raw_phone.as_deref().and_then(normalize_phone);
    Lead {
        id: payload.id.clone(),
        raw_phone,
        normalized_phone,
        name: payload.customer.name.clone(),
        email: payload.customer.email.clone(),
        cpf: payload.customer.cpf.clone(),
        source_channel: payload.channel.clone(),
        seller_name: payload.seller.as_ref().map(|s| s.name.clone()),
        created_at: payload.created_at.unwrap_or_else(Utc::now),
    }
}

/// Persist an incoming lead and make sure its enrichment record exists.
///
/// The record is created `unenriched` on first sight. An update that
/// corrects the phone of an `invalid_phone` lead re-validates it through
/// the gate; that is the only path out of `invalid_phone`.
pub async fn ingest_lead(repo: &Arc<dyn LeadRepository>, payload: &C2sLeadPayload) -> Result<Lead> {
    let lead = lead_from_payload(payload);
    repo.upsert_lead(&lead).await?;
    match repo.get_enrichment_record(&lead.id).await? {
        None => {
            repo.upsert_enrichment_record(&EnrichmentRecord::new(&lead.id))
                .await?;
        }
        Some(mut record) if record.status == EnrichmentStatus::InvalidPhone => {
            let normalized = lead.normalized_phone.clone().unwrap_or_default();
            if state::revalidate_phone(&mut record, &normalized).is_valid() {
                repo.upsert_enrichment_record(&record).await?;
            }
        }
        Some(_) => {}
    }
    tracing::info!(
        lead_id = %lead.id,
        channel = lead.source_channel.as_deref().unwrap_or("unknown"),
        "lead ingested"
    );
    Ok(lead)
}
