// Thu Jan 15 2026 - Alex

pub mod json;
pub mod report;
pub mod table;

pub use json::JsonSerializer;
pub use report::{ReportFormat, ReportGenerator};
pub use table::{ResultRow, ResultStore, ResultTable, RowFlags};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
