// ⚠️ Error taxonomy for the dashboard core
// Only editing, lookup and I/O plumbing can fail. Filtering and aggregation are total.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Unknown query key: {0}")]
    UnknownQuery(String),

    #[error("Unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Row {row} out of range (table has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
