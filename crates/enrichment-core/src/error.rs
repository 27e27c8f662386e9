use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnrichmentError>;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("batch too large: {size} ids (limit {limit})")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage: {0}")]
    Storage(#[from] anyhow::Error),
}
