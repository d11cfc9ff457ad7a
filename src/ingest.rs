//! # Ingestion
//!
//! Turns an uploaded spreadsheet into a metadata row plus a data table, in a
//! fixed order:
//!
//! 1. load the grid and normalize it around the header row
//! 2. insert the metadata row with an empty table name
//! 3. create the data table
//! 4. write the table name back into the metadata row
//!
//! Nothing is rolled back. A failure after step 2 leaves a metadata row with
//! an empty table name, which [`DuckDbStore::orphans`](crate::database::DuckDbStore::orphans)
//! reports.

use crate::database::NewUpload;
use crate::database::SinkError;
use crate::database::StorageSink;
use crate::database::UploadRecord;
use crate::dataset::normalize;
use crate::dataset::Dataset;
use crate::error::InsightError;
use crate::naming::file_stem;
use crate::naming::slug;
use crate::naming::table_name;
use crate::spreadsheet;
use chrono::SubsecRound;
use chrono::Utc;
use log::info;
use log::warn;
use std::fmt::Display;

/// Raw upload as received from a caller.
#[derive(Clone, Debug)]
pub struct Upload<'a> {
    pub bytes: &'a [u8],
    /// Original file name; its stem becomes part of the table name.
    pub filename: &'a str,
    /// 1-based row holding the column labels.
    pub header_row: usize,
    /// Acting user, stored verbatim.
    pub uploaded_by: &'a str,
}

/// Last state an ingestion reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IngestState {
    Received,
    Normalized,
    MetadataPersisted,
    DataPersisted,
    TableNameBackfilled,
}

impl Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IngestState::Received => "received",
            IngestState::Normalized => "normalized",
            IngestState::MetadataPersisted => "metadata persisted",
            IngestState::DataPersisted => "data persisted",
            IngestState::TableNameBackfilled => "table name backfilled",
        })
    }
}

/// Result of a successful ingestion.
#[derive(Clone, Debug)]
pub struct IngestOutcome {
    pub record: UploadRecord,
    pub dataset: Dataset,
}

/// Runs ingestions against an explicitly supplied storage sink.
pub struct IngestionCoordinator<'s, S: StorageSink> {
    sink: &'s mut S,
}

impl<'s, S: StorageSink> IngestionCoordinator<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        Self { sink }
    }

    pub fn ingest(&mut self, upload: &Upload) -> Result<IngestOutcome, InsightError> {
        info!("{}: '{}' with header row {}", IngestState::Received, upload.filename, upload.header_row);
        let grid = spreadsheet::load(upload.bytes)?;
        let dataset = normalize(&grid, upload.header_row)?;
        info!("{}: {} columns, {} rows", IngestState::Normalized, dataset.width(), dataset.row_count());

        let new_upload = NewUpload {
            filename: upload.filename.to_owned(),
            uploaded_by: upload.uploaded_by.to_owned(),
            header_row: upload.header_row,
            row_count: dataset.row_count(),
            // storage keeps microseconds
            uploaded_at: Utc::now().naive_utc().trunc_subsecs(6),
        };
        let id = self
            .sink
            .insert_metadata(&new_upload)
            .map_err(|source| InsightError::Sink {
                state: IngestState::Normalized,
                upload_id: None,
                source,
            })?;
        info!("{}: upload {id}", IngestState::MetadataPersisted);

        let name = table_name(id, &slug(file_stem(upload.filename)));
        self.sink
            .create_or_replace_table(&name, dataset.labels(), dataset.rows())
            .map_err(|source| orphaned(IngestState::MetadataPersisted, id, source))?;
        info!("{}: table {name}", IngestState::DataPersisted);

        self.sink
            .update_metadata_table_name(id, &name)
            .map_err(|source| orphaned(IngestState::DataPersisted, id, source))?;
        info!("{}: upload {id} -> {name}", IngestState::TableNameBackfilled);

        let NewUpload {
            filename,
            uploaded_by,
            header_row,
            row_count,
            uploaded_at,
        } = new_upload;
        Ok(IngestOutcome {
            record: UploadRecord {
                id,
                filename,
                table_name: name,
                uploaded_by,
                header_row,
                row_count,
                uploaded_at,
            },
            dataset,
        })
    }
}

fn orphaned(state: IngestState, id: i64, source: SinkError) -> InsightError {
    warn!("Upload {id} left without a table name after {state}: {source}");
    InsightError::Sink {
        state,
        upload_id: Some(id),
        source,
    }
}
