//! # Sheet Insight
//!
//! Spreadsheet ingestion into DuckDB with natural-language querying.
//!
//! An uploaded workbook is read into a headerless grid, one of its rows is
//! picked as the header, and the rows below it become a table named after the
//! upload. Tables can then be questioned through an LLM job service, either as
//! generated SQL or as prose about a preview.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML (`.xlsx`, `.xlsm`) and OpenDocument (`.ods`),
//!   detected from content; only the first sheet is read
//! - **Any header row**: rows above the chosen header are dropped, ragged rows
//!   are padded or cut to the header width
//! - **Traceable storage**: each upload gets an `uploaded_files` row before its
//!   data table exists, so failed uploads stay visible as orphans
//! - **Safe identifiers**: table and column names are always quoted and values
//!   are bound as parameters
//! - **LLM questions**: bounded polling against a job service over HTTP
//!
//! ## Example
//!
//! ```no_run
//! use sheet_insight::database::DuckDbStore;
//! use sheet_insight::ingest::{IngestionCoordinator, Upload};
//!
//! let bytes = std::fs::read("sales.xlsx")?;
//! let mut store = DuckDbStore::open("insight.duckdb")?;
//! let outcome = IngestionCoordinator::new(&mut store).ingest(&Upload {
//!     bytes: &bytes,
//!     filename: "sales.xlsx",
//!     header_row: 1,
//!     uploaded_by: "alice",
//! })?;
//! println!("created {}", outcome.record.table_name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod helpers;

pub mod analyze;
pub mod config;
pub mod database;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod naming;
pub mod preview;
pub mod spreadsheet;

pub use error::InsightError;
pub use error::Stage;
