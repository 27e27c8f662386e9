//! One-shot C2S pull: page through the CRM lead listing, ingest every
//! lead, then run a single enrichment sweep over the eligible ones.
//!
//! Meant to be invoked by an external scheduler; the process exits when
//! the run finishes or the pull aborts on sustained rate limiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use c2s_enrichment::config::Config;
use c2s_enrichment::crm::C2sClient;
use c2s_enrichment::ingest;
use c2s_enrichment::lookup::LookupClient;
use c2s_enrichment::sweep::SweepWorker;
use enrichment_core::batch::BatchCoordinator;
use enrichment_core::ports::{LeadRepository, LookupService};
use enrichment_postgres::PgLeadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "c2s_enrichment=info,enrichment_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    let repo: Arc<dyn LeadRepository> = Arc::new(PgLeadStore::new(pool));

    let crm = C2sClient::new(&config)?;
    let payloads = crm.pull_all().await?;
    tracing::info!(leads = payloads.len(), "ingesting pulled leads");
    for payload in &payloads {
        if let Err(e) = ingest::ingest_lead(&repo, payload).await {
            tracing::warn!(lead_id = %payload.id, error = %e, "failed to ingest pulled lead");
        }
    }

    let lookup: Arc<dyn LookupService> = Arc::new(LookupClient::new(&config)?);
    let coordinator = Arc::new(BatchCoordinator::new(Arc::clone(&repo), lookup));
    let worker = SweepWorker::new(
        Arc::clone(&repo),
        coordinator,
        Duration::from_secs(config.sweep_interval_secs),
        config.sweep_batch_size,
        config.sweep_concurrency,
    );

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = worker.sweep_once(cancel_rx).await?;
    tracing::info!(
        total = outcome.summary.total,
        enriched = outcome.summary.enriched,
        skipped = outcome.summary.skipped,
        failed = outcome.summary.failed,
        "pull-and-enrich run finished"
    );
    worker.dedup_once().await?;
    Ok(())
}
