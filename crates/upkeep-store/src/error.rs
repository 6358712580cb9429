use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No row with the given ID exists.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A cycle for (company, frequency, start, end) already exists.
    /// Raised by the UNIQUE constraint when two callers race on the same
    /// period; the caller is expected to re-fetch the winning row.
    #[error("cycle already exists for company {company_id} in this period")]
    CycleExists { company_id: String },

    /// The task is already assigned to this company.
    #[error("task {task_id} is already assigned to company {company_id}")]
    DuplicateAssignment {
        company_id: String,
        task_id: String,
    },

    /// Company and task names are unique.
    #[error("{entity} name already taken: {name}")]
    DuplicateName { entity: &'static str, name: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
