use crate::database::column::column_definitions;
use crate::database::column::quote_identifier;
use crate::database::column::validate_labels;
use crate::database::NewUpload;
use crate::database::ResultMessage;
use crate::database::SinkError;
use crate::database::StorageSink;
use crate::database::UploadRecord;
use crate::dataset::Dataset;
use chrono::NaiveDateTime;
use duckdb::params;
use duckdb::params_from_iter;
use duckdb::Connection;
use log::debug;
use log::info;
use std::path::Path;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS uploaded_files_id_seq START 1;
CREATE TABLE IF NOT EXISTS uploaded_files (
    id BIGINT NOT NULL DEFAULT nextval('uploaded_files_id_seq'),
    filename VARCHAR NOT NULL,
    table_name VARCHAR NOT NULL DEFAULT '',
    uploaded_by VARCHAR NOT NULL,
    header_row BIGINT NOT NULL,
    row_count BIGINT NOT NULL,
    uploaded_at TIMESTAMP NOT NULL
);
";

const SELECT_UPLOADS: &str = "SELECT id, filename, table_name, uploaded_by, header_row, row_count, \
    CAST(uploaded_at AS VARCHAR) FROM uploaded_files";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Storage sink backed by a DuckDB database file or an in-memory database.
pub struct DuckDbStore {
    connection: Connection,
}

impl DuckDbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        info!("Opening database {}", path.display());
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating the metadata table if needed.
    pub fn new(connection: Connection) -> Result<Self, SinkError> {
        connection.execute_batch(SCHEMA).map_err(SinkError::from).with_prefix("create schema")?;
        Ok(Self { connection })
    }

    pub fn upload(&self, id: i64) -> Result<Option<UploadRecord>, SinkError> {
        let sql = format!("{SELECT_UPLOADS} WHERE id = ?");
        Ok(self.select_uploads(&sql, params![id])?.into_iter().next())
    }

    /// All uploads, oldest first.
    pub fn uploads(&self) -> Result<Vec<UploadRecord>, SinkError> {
        self.select_uploads(&format!("{SELECT_UPLOADS} ORDER BY id"), params![])
    }

    /// Uploads whose data table was never created.
    pub fn orphans(&self) -> Result<Vec<UploadRecord>, SinkError> {
        let sql = format!("{SELECT_UPLOADS} WHERE table_name = '' ORDER BY id");
        self.select_uploads(&sql, params![])
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, SinkError> {
        let count: i64 = self.connection.query_row(
            "SELECT count(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = ?",
            params![table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Runs caller SQL verbatim and returns at most `limit` rows rendered as text.
    ///
    /// NULL renders as `""`.
    pub fn run_query(&self, sql: &str, limit: usize) -> Result<Dataset, SinkError> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let labels = self.describe(sql).with_prefix("describe query")?;
        let columns = labels
            .iter()
            .map(|label| format!("CAST({} AS VARCHAR)", quote_identifier(label)))
            .collect::<Vec<_>>()
            .join(", ");
        let select = format!("SELECT {columns} FROM ({sql}) LIMIT ?");
        let rows = self.select_text(&select, labels.len(), limit).with_prefix("run query")?;
        Ok(Dataset::new(labels, rows))
    }

    fn describe(&self, sql: &str) -> Result<Vec<String>, SinkError> {
        let mut statement = self.connection.prepare(&format!("DESCRIBE {sql}"))?;
        let labels = statement
            .query_map(params![], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn table_columns(&self, table_name: &str) -> Result<Vec<String>, SinkError> {
        let mut statement = self.connection.prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = ? \
             ORDER BY ordinal_position",
        )?;
        let labels = statement
            .query_map(params![table_name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn select_text(
        &self,
        sql: &str,
        width: usize,
        limit: usize,
    ) -> Result<Vec<Vec<String>>, SinkError> {
        let mut statement = self.connection.prepare(sql)?;
        let rows = statement
            .query_map(params![limit as i64], |row| {
                (0..width)
                    .map(|index| row.get::<_, Option<String>>(index).map(Option::unwrap_or_default))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn select_uploads(
        &self,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<UploadRecord>, SinkError> {
        let mut statement = self.connection.prepare(sql)?;
        let rows = statement
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, filename, table_name, uploaded_by, header_row, row_count, uploaded_at)| {
                Ok(UploadRecord {
                    id,
                    filename,
                    table_name,
                    uploaded_by,
                    header_row: header_row as usize,
                    row_count: row_count as usize,
                    uploaded_at: NaiveDateTime::parse_from_str(&uploaded_at, TIMESTAMP_FORMAT)
                        .map_err(|_| SinkError::InvalidTimestamp(uploaded_at.to_owned()))?,
                })
            })
            .collect()
    }
}

impl StorageSink for DuckDbStore {
    fn insert_metadata(&mut self, upload: &NewUpload) -> Result<i64, SinkError> {
        let uploaded_at = upload.uploaded_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let id = self.connection.query_row(
            "INSERT INTO uploaded_files \
             (filename, uploaded_by, header_row, row_count, uploaded_at) \
             VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP)) RETURNING id",
            params![
                upload.filename,
                upload.uploaded_by,
                upload.header_row as i64,
                upload.row_count as i64,
                uploaded_at
            ],
            |row| row.get::<_, i64>(0),
        )?;
        debug!("Inserted upload {id} for '{}'", upload.filename);
        Ok(id)
    }

    fn update_metadata_table_name(&mut self, id: i64, table_name: &str) -> Result<(), SinkError> {
        self.connection.execute(
            "UPDATE uploaded_files SET table_name = ? WHERE id = ?",
            params![table_name, id],
        )?;
        Ok(())
    }

    fn create_or_replace_table(
        &mut self,
        table_name: &str,
        labels: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), SinkError> {
        validate_labels(labels)?;
        let table = quote_identifier(table_name);
        let placeholders = vec!["?"; labels.len()].join(", ");
        let transaction = self.connection.transaction()?;
        let create = format!("CREATE OR REPLACE TABLE {table} ({})", column_definitions(labels));
        transaction
            .execute_batch(&create)
            .map_err(SinkError::from)
            .with_prefix("create table")?;
        {
            let insert = format!("INSERT INTO {table} VALUES ({placeholders})");
            let mut statement = transaction.prepare(&insert)?;
            for row in rows {
                statement.execute(params_from_iter(row.iter()))?;
            }
        }
        transaction.commit()?;
        debug!("Created table {table} with {} columns and {} rows", labels.len(), rows.len());
        Ok(())
    }

    fn query_table(&self, table_name: &str, limit: usize) -> Result<Dataset, SinkError> {
        let labels = self.table_columns(table_name)?;
        if labels.is_empty() {
            return Err(SinkError::TableNotFound(table_name.to_owned()));
        }
        let columns = labels
            .iter()
            .map(|label| quote_identifier(label))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {columns} FROM {} LIMIT ?", quote_identifier(table_name));
        let rows = self.select_text(&sql, labels.len(), limit)?;
        Ok(Dataset::new(labels, rows))
    }
}
