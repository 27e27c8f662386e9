//! `PgLeadStore` — Postgres-backed [`LeadRepository`].

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use enrichment_core::error::{EnrichmentError, Result};
use enrichment_core::model::{DuplicateEdge, EnrichmentRecord, Lead};
use enrichment_core::ports::LeadRepository;
use enrichment_core::retry::MAX_RETRIES;

use crate::rows::{parse_match_type, EnrichmentRow, LeadRow};

/// Postgres-backed lead/enrichment/duplicate repository.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadRepository for PgLeadStore {
    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT id, raw_phone, normalized_phone, name, email, cpf,
                   source_channel, seller_name, created_at
            FROM leads
            WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Lead::from))
    }

    async fn upsert_lead(&self, lead: &Lead) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leads (id, raw_phone, normalized_phone, name, email, cpf,
                               source_channel, seller_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                raw_phone = EXCLUDED.raw_phone,
                normalized_phone = EXCLUDED.normalized_phone,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                cpf = COALESCE(EXCLUDED.cpf, leads.cpf)
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.raw_phone)
        .bind(&lead.normalized_phone)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.cpf)
        .bind(&lead.source_channel)
        .bind(&lead.seller_name)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn get_enrichment_record(&self, lead_id: &str) -> Result<Option<EnrichmentRecord>> {
        let row = sqlx::query_as::<_, EnrichmentRow>(
            r#"
            SELECT lead_id, status, retry_count, last_retry_at, last_error,
                   cpf, cpf_source, raw_response, enriched_at
            FROM lead_enrichment
            WHERE lead_id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| {
            EnrichmentRecord::try_from(r)
                .map_err(|e: String| EnrichmentError::Storage(anyhow!(e)))
        })
        .transpose()
    }

    async fn upsert_enrichment_record(&self, record: &EnrichmentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lead_enrichment
                (lead_id, status, retry_count, last_retry_at, last_error,
                 cpf, cpf_source, raw_response, enriched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (lead_id) DO UPDATE SET
                status = EXCLUDED.status,
                retry_count = EXCLUDED.retry_count,
                last_retry_at = EXCLUDED.last_retry_at,
                last_error = EXCLUDED.last_error,
                cpf = EXCLUDED.cpf,
                cpf_source = EXCLUDED.cpf_source,
                raw_response = EXCLUDED.raw_response,
                enriched_at = EXCLUDED.enriched_at
            "#,
        )
        .bind(&record.lead_id)
        .bind(record.status.as_str())
        .bind(record.retry_count)
        .bind(record.last_retry_at)
        .bind(&record.last_error)
        .bind(&record.cpf)
        .bind(&record.cpf_source)
        .bind(&record.raw_response)
        .bind(record.enriched_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn list_eligible_leads(&self, limit: i64) -> Result<Vec<String>> {
        // Coarse SQL filter: retryable status (or no record yet), retries
        // not spent, and at least the minimum backoff elapsed. The precise
        // per-count backoff check stays in the scheduler. Exhausted records
        // are included once so the sweep can fail them out.
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT l.id
            FROM leads l
            LEFT JOIN lead_enrichment e ON e.lead_id = l.id
            WHERE e.lead_id IS NULL
               OR (e.status IN ('unenriched', 'pending', 'partial')
                   AND (e.retry_count >= $2
                        OR e.last_retry_at IS NULL
                        OR e.last_retry_at <= now() - interval '1 hour'))
            ORDER BY l.created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(MAX_RETRIES)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn list_all_leads(&self) -> Result<Vec<Lead>> {
        let rows = sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT id, raw_phone, normalized_phone, name, email, cpf,
                   source_channel, seller_name, created_at
            FROM leads
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn replace_duplicate_edges(&self, edges: &[DuplicateEdge]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        sqlx::query("DELETE FROM lead_duplicates")
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        for edge in edges {
            // Identical (lead, match type) keys are a no-op by design.
            sqlx::query(
                r#"
                INSERT INTO lead_duplicates (lead_id, canonical_lead_id, match_type, match_value)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (lead_id, match_type) DO NOTHING
                "#,
            )
            .bind(&edge.lead_id)
            .bind(&edge.canonical_lead_id)
            .bind(edge.match_type.as_str())
            .bind(&edge.match_value)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        tx.commit().await.map_err(|e| anyhow!(e))?;
        tracing::debug!(edges = edges.len(), "duplicate edge set replaced");
        Ok(())
    }

    async fn list_duplicate_edges(&self) -> Result<Vec<DuplicateEdge>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT lead_id, canonical_lead_id, match_type, match_value
            FROM lead_duplicates
            ORDER BY lead_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|(lead_id, canonical_lead_id, match_type, match_value)| {
                Ok(DuplicateEdge {
                    lead_id,
                    canonical_lead_id,
                    match_type: parse_match_type(&match_type)
                        .map_err(|e| EnrichmentError::Storage(anyhow!(e)))?,
                    match_value,
                })
            })
            .collect()
    }
}
