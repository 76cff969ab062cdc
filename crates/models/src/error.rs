use thiserror::Error;

use crate::estimate::EstimateError;

#[derive(Error, Debug)]
pub enum MatchcastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fixture not found: {fixture_id}")]
    FixtureNotFound { fixture_id: i64 },

    #[error("Invalid model estimate: {0}")]
    InvalidEstimate(#[from] EstimateError),

    #[error("Analyst request failed: {0}")]
    Analyst(String),

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Invalid stored value for {field}: {value}")]
    InvalidRecord { field: &'static str, value: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatchcastError {
    /// Run-level errors abort a whole invocation; everything else is scoped
    /// to the fixture or prediction being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MatchcastError::Config(_) | MatchcastError::Database(_) | MatchcastError::Migration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MatchcastError>;
