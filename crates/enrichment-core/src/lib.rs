//! Enrichment lifecycle core.
//!
//! Everything that decides whether, when, and how a lead gets an enrichment
//! attempt: phone normalization and the validity gate, the status state
//! machine, exponential-backoff retry scheduling, duplicate detection, and
//! the bounded-concurrency batch coordinator. Storage and the lookup
//! service are ports (`Arc<dyn Trait>`); this crate has no SQL and no HTTP.

pub mod batch;
pub mod dedup;
pub mod error;
pub mod model;
pub mod phone;
pub mod ports;
pub mod retry;
pub mod state;

pub use error::{EnrichmentError, Result};
