use thiserror::Error;
use ulid::Ulid;

use crate::model::ConflictRef;
use crate::rows::RowError;

/// A data-store read failed. Never to be read as "nothing booked".
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed row from data store: {0}")]
    Malformed(#[from] RowError),
    #[error("{0} limit reached")]
    Full(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("lookup failed: {0}")]
    Source(#[from] SourceError),
    #[error("time range conflicts with {}", describe_conflicts(.0))]
    Conflict(Vec<ConflictRef>),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

impl From<RowError> for EngineError {
    fn from(e: RowError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

fn describe_conflicts(conflicts: &[ConflictRef]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} {} [{}, {})", c.kind.as_str(), c.id, c.start_at, c.end_at))
        .collect::<Vec<_>>()
        .join(", ")
}
