//! Natural-language questions over uploaded tables, answered by an LLM job
//! service either as DuckDB SQL or as prose about a preview.

use crate::database::column::quote_identifier;
use crate::database::column::COLUMN_TYPE;
use crate::database::StorageSink;
use crate::error::InsightError;
use crate::llm::run_job;
use crate::llm::JobRequest;
use crate::llm::JobService;
use crate::llm::PollPolicy;
use crate::preview::preview_dataset;
use crate::preview::Preview;
use crate::preview::DATASET_PREVIEW_ROWS;
use log::info;

pub const SQL_SYSTEM_PROMPT: &str = "You are an expert data analyst. Given a schema and a user question, \
write a SQL query using DuckDB dialect with no commentary.";

const PREVIEW_SYSTEM_PROMPT: &str = "You are a helpful data analyst. Use the table preview and the user's question \
to provide a clear, concise, and relevant answer. Only base your answer on the data shown.";

/// Describes a table for the model, e.g. `Table "data_1_sales" with columns: "Region" VARCHAR`.
pub fn schema_description(table_name: &str, labels: &[String]) -> String {
    let columns = labels
        .iter()
        .map(|label| format!("{} {COLUMN_TYPE}", quote_identifier(label)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Table {} with columns: {columns}", quote_identifier(table_name))
}

pub fn sql_request(model: &str, table_name: &str, labels: &[String], question: &str) -> JobRequest {
    JobRequest {
        content: format!("{}\n\nQuestion: {question}", schema_description(table_name, labels)),
        model: model.to_owned(),
        system_prompt: SQL_SYSTEM_PROMPT.to_owned(),
    }
}

pub fn preview_request(model: &str, preview: &Preview, question: &str) -> JobRequest {
    JobRequest {
        content: question.to_owned(),
        model: model.to_owned(),
        system_prompt: format!("{PREVIEW_SYSTEM_PROMPT}\n\nTABLE PREVIEW:\n{preview}"),
    }
}

/// Pulls the statement out of a model answer: the first fenced block if any,
/// without a trailing `;`.
pub fn extract_sql(answer: &str) -> String {
    let mut sql = answer.trim();
    if let Some(start) = sql.find("```") {
        let block = &sql[start + 3..];
        // language tag such as ```sql
        let block = match block.find('\n') {
            Some(newline) if !block[..newline].contains("```") => &block[newline + 1..],
            _ => block,
        };
        sql = block.find("```").map_or(block, |end| &block[..end]);
    }
    sql.trim().trim_end_matches(';').trim_end().to_owned()
}

/// Asks questions about tables through a job service.
pub struct Analyst<'a, J: JobService + ?Sized> {
    service: &'a J,
    model: String,
    policy: PollPolicy,
}

impl<'a, J: JobService + ?Sized> Analyst<'a, J> {
    pub fn new(service: &'a J, model: &str, policy: PollPolicy) -> Self {
        Self {
            service,
            model: model.to_owned(),
            policy,
        }
    }

    /// Translates a question about `table_name` into a SQL statement.
    pub fn ask_sql<S: StorageSink>(&self, sink: &S, table_name: &str, question: &str) -> Result<String, InsightError> {
        let question = non_empty(question)?;
        let labels = sink.query_table(table_name, 0).map_err(InsightError::Query)?.into_parts().0;
        let request = sql_request(&self.model, table_name, &labels, question);
        info!("Asking {} for SQL over {table_name}", self.model);
        let answer = run_job(self.service, &request, &self.policy)?;
        Ok(extract_sql(&answer))
    }

    /// Answers a question from the first rows of `table_name`.
    pub fn ask_about_table<S: StorageSink>(&self, sink: &S, table_name: &str, question: &str) -> Result<String, InsightError> {
        let dataset = sink.query_table(table_name, DATASET_PREVIEW_ROWS).map_err(InsightError::Query)?;
        self.ask_about_preview(&preview_dataset(&dataset, DATASET_PREVIEW_ROWS), question)
    }

    pub fn ask_about_preview(&self, preview: &Preview, question: &str) -> Result<String, InsightError> {
        let question = non_empty(question)?;
        let request = preview_request(&self.model, preview, question);
        info!("Asking {} about a {}-row preview", self.model, preview.rows.len());
        Ok(run_job(self.service, &request, &self.policy)?)
    }
}

fn non_empty(question: &str) -> Result<&str, InsightError> {
    let question = question.trim();
    if question.is_empty() {
        Err(InsightError::EmptyQuestion)
    } else {
        Ok(question)
    }
}
