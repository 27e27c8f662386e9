//! HTTP surface: the C2S webhook receiver and a health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use enrichment_core::batch::BatchCoordinator;
use enrichment_core::ports::LeadRepository;

use crate::ingest::{self, C2sWebhookEvent};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn LeadRepository>,
    pub coordinator: Arc<BatchCoordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/c2s", post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Accept a C2S hook event: upsert the lead, then kick off a single-lead
/// enrichment attempt in the background so the hook responds fast.
async fn receive_webhook(
    State(state): State<AppState>,
    Json(event): Json<C2sWebhookEvent>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !event.is_ingestible() {
        tracing::debug!(event = %event.event, lead_id = %event.lead.id, "ignoring hook event");
        return (StatusCode::OK, Json(json!({"status": "ignored"})));
    }

    match ingest::ingest_lead(&state.repo, &event.lead).await {
        Ok(lead) => {
            let coordinator = Arc::clone(&state.coordinator);
            let lead_id = lead.id.clone();
            tokio::spawn(async move {
                let result = coordinator.enrich_lead(&lead_id).await;
                tracing::debug!(
                    lead_id = %lead_id,
                    status = ?result.status,
                    skip = ?result.skip_reason,
                    "webhook-triggered enrichment finished"
                );
            });
            (StatusCode::OK, Json(json!({"status": "accepted", "lead_id": lead.id})))
        }
        Err(e) => {
            tracing::error!(lead_id = %event.lead.id, error = %e, "webhook ingestion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error"})),
            )
        }
    }
}
