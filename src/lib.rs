//! C2S lead enrichment service.
//!
//! Glue around `enrichment-core`: the webhook receiver, the C2S pull
//! client, the lookup-service client, the background sweep worker, and
//! process configuration. All decisions about whether/when a lead is
//! enriched live in the core crate.

pub mod api;
pub mod config;
pub mod crm;
pub mod ingest;
pub mod lookup;
pub mod sweep;
