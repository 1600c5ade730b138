//! Store error classification.
//!
//! PostgreSQL reports a duplicate `ts` as SQLSTATE 23505 and a row with no
//! matching partition as SQLSTATE 23514 ("no partition of relation ... found
//! for row"). Both are mapped to dedicated variants so the polling loop can
//! log them as per-sample faults.

/// PostgreSQL unique constraint violation.
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL check violation, also raised when no partition accepts a row.
const SQLSTATE_CHECK_VIOLATION: &str = "23514";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A sample with the same timestamp already exists.
    #[error("Constraint violation: {constraint}")]
    Constraint { constraint: String },

    /// No partition covers the sample's day.
    #[error("No partition for row: {0}")]
    MissingPartition(String),

    /// Connectivity or any other database failure.
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(SQLSTATE_UNIQUE_VIOLATION) => {
                    return StoreError::Constraint {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    };
                }
                Some(SQLSTATE_CHECK_VIOLATION) if db_err.message().contains("no partition") => {
                    return StoreError::MissingPartition(db_err.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}
