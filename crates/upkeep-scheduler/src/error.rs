use thiserror::Error;
use upkeep_store::StoreError;

/// Errors that can occur within the cycle scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Calendar arithmetic produced no valid instant for the reference.
    #[error("invalid reference instant: {0}")]
    InvalidReference(String),

    /// Persistence failed. For a full run this is caught per company so
    /// one unreachable write does not abort the remaining companies.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
