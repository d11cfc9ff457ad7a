use crate::database::SinkError;
use crate::ingest::IngestState;
use crate::llm::LlmError;
use std::fmt::Display;
use thiserror::Error;

/// Pipeline stage an error originates from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Load,
    Normalize,
    Persist,
    Analyze,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Persist => "persist",
            Stage::Analyze => "analyze",
        })
    }
}

/// Main error type for ingestion and analysis.
///
/// Every message starts with the failing stage, e.g. `normalize: header row 5 ...`,
/// so a caller can tell bad input from a system fault.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("load: unreadable spreadsheet: {0}")]
    UnreadableFormat(String),

    #[error("load: spreadsheet has no rows")]
    EmptyFile,

    #[error("normalize: header row {header_row} is outside 1..={row_count}")]
    HeaderRowOutOfRange { header_row: usize, row_count: usize },

    #[error("persist: storage failed after {state}{}: {source}", upload_suffix(.upload_id))]
    Sink {
        state: IngestState,
        upload_id: Option<i64>,
        source: SinkError,
    },

    #[error("analyze: LLM job {job_id} still pending after {attempts} polls")]
    LlmTimeout { job_id: String, attempts: u32 },

    #[error("analyze: LLM job {job_id} failed: {message}")]
    LlmJob { job_id: String, message: String },

    #[error("analyze: LLM request failed: {0}")]
    LlmRequest(String),

    #[error("analyze: question is empty")]
    EmptyQuestion,

    #[error("analyze: query failed: {0}")]
    Query(SinkError),
}

fn upload_suffix(upload_id: &Option<i64>) -> String {
    upload_id.map(|id| format!(" (upload {id})")).unwrap_or_default()
}

impl InsightError {
    pub fn stage(&self) -> Stage {
        match self {
            InsightError::UnreadableFormat(_) | InsightError::EmptyFile => Stage::Load,
            InsightError::HeaderRowOutOfRange { .. } => Stage::Normalize,
            InsightError::Sink { .. } => Stage::Persist,
            InsightError::LlmTimeout { .. }
            | InsightError::LlmJob { .. }
            | InsightError::LlmRequest(_)
            | InsightError::EmptyQuestion
            | InsightError::Query(_) => Stage::Analyze,
        }
    }
}

impl From<LlmError> for InsightError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Timeout { job_id, attempts } => InsightError::LlmTimeout { job_id, attempts },
            LlmError::Job { job_id, message } => InsightError::LlmJob { job_id, message },
            error => InsightError::LlmRequest(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_start_with_stage() {
        let errors = [
            InsightError::UnreadableFormat("bad zip".to_owned()),
            InsightError::EmptyFile,
            InsightError::HeaderRowOutOfRange { header_row: 5, row_count: 3 },
            InsightError::Sink {
                state: IngestState::MetadataPersisted,
                upload_id: Some(7),
                source: SinkError::NoColumns,
            },
            InsightError::LlmTimeout { job_id: "j1".to_owned(), attempts: 60 },
            InsightError::EmptyQuestion,
        ];
        for error in errors {
            let message = error.to_string();
            assert!(message.starts_with(&format!("{}: ", error.stage())), "{message}");
        }
    }

    #[test]
    fn sink_message_names_upload() {
        let error = InsightError::Sink {
            state: IngestState::MetadataPersisted,
            upload_id: Some(7),
            source: SinkError::NoColumns,
        };
        assert_eq!(
            error.to_string(),
            "persist: storage failed after metadata persisted (upload 7): table needs at least one column"
        );
    }

    #[test]
    fn llm_errors_convert() {
        let error = InsightError::from(LlmError::Timeout { job_id: "j1".to_owned(), attempts: 3 });
        assert!(matches!(error, InsightError::LlmTimeout { attempts: 3, .. }));
        let error = InsightError::from(LlmError::MissingJobId);
        assert_eq!(error.stage(), Stage::Analyze);
    }
}
