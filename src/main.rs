//! Process entry point: wires Postgres, the lookup client, the webhook
//! server, and the sweep worker together, and owns shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use c2s_enrichment::api::{self, AppState};
use c2s_enrichment::config::Config;
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
                .unwrap_or_else(|_| "c2s_enrichment=debug,enrichment_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(bind = %config.bind_addr, "starting enrichment service");

    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    let repo: Arc<dyn LeadRepository> = Arc::new(PgLeadStore::new(pool));
    let lookup: Arc<dyn LookupService> = Arc::new(LookupClient::new(&config)?);
    let coordinator = Arc::new(BatchCoordinator::new(Arc::clone(&repo), lookup));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = SweepWorker::new(
        Arc::clone(&repo),
        Arc::clone(&coordinator),
        Duration::from_secs(config.sweep_interval_secs),
        config.sweep_batch_size,
        config.sweep_concurrency,
    );
    let worker_handle = {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(rx).await })
    };

    let app = api::router(AppState { repo, coordinator });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shutdown signal received");
    shutdown_tx.send(true).ok();
    worker_handle.await.ok();
    Ok(())
}
