//! # Storage Sink
//!
//! The contract the ingestion pipeline persists through, the upload metadata
//! model and the DuckDB-backed implementation.

pub mod column;
mod store;

pub use store::DuckDbStore;

use crate::dataset::Dataset;
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a storage sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{0}")]
    WithContextError(String),

    #[error("{0}")]
    DuckDbError(#[from] duckdb::Error),

    #[error("blank column label at position {position}")]
    BlankColumn { position: usize },

    #[error("duplicate column label '{label}' at positions {first} and {second}")]
    DuplicateColumn {
        label: String,
        first: usize,
        second: usize,
    },

    #[error("table needs at least one column")]
    NoColumns,

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SinkError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SinkError::WithContextError(format!("{}: {}", message, e)))
    }
}

/// One row of the `uploaded_files` metadata table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadRecord {
    pub id: i64,
    pub filename: String,
    /// Empty until the data table exists; an empty name marks an orphan upload.
    pub table_name: String,
    pub uploaded_by: String,
    /// 1-based header row the upload was normalized with
    pub header_row: usize,
    pub row_count: usize,
    pub uploaded_at: NaiveDateTime,
}

impl UploadRecord {
    pub fn is_orphan(&self) -> bool {
        self.table_name.is_empty()
    }
}

/// Metadata for an upload not yet stored; the sink assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUpload {
    pub filename: String,
    pub uploaded_by: String,
    pub header_row: usize,
    pub row_count: usize,
    pub uploaded_at: NaiveDateTime,
}

/// Write and read contract between the ingestion pipeline and storage.
pub trait StorageSink {
    /// Stores a metadata row with an empty table name and returns its id.
    fn insert_metadata(&mut self, upload: &NewUpload) -> Result<i64, SinkError>;

    /// Sets the table name of an existing metadata row.
    fn update_metadata_table_name(&mut self, id: i64, table_name: &str) -> Result<(), SinkError>;

    /// Replaces `table_name` with a table holding `rows` under `labels`.
    fn create_or_replace_table(
        &mut self,
        table_name: &str,
        labels: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), SinkError>;

    /// Reads up to `limit` rows of a data table.
    fn query_table(&self, table_name: &str, limit: usize) -> Result<Dataset, SinkError>;
}
