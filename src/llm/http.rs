use crate::llm::JobRequest;
use crate::llm::JobService;
use crate::llm::JobStatus;
use crate::llm::LlmError;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;

/// Job service reached over HTTP with an optional bearer token.
pub struct HttpJobService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobStatusResponse {
    status: String,
    result: Option<String>,
    output: Option<String>,
    error: Option<String>,
}

impl JobStatusResponse {
    fn into_status(self) -> JobStatus {
        match self.status.as_str() {
            "done" => JobStatus::Done(self.result.or(self.output).unwrap_or_default().trim().to_owned()),
            "error" | "failed" => JobStatus::Failed(self.error.unwrap_or_else(|| "Unknown error".to_owned())),
            _ => JobStatus::Pending,
        }
    }
}

impl HttpJobService {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl JobService for HttpJobService {
    fn submit(&self, request: &JobRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/jobs", self.base_url);
        let response: Value = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()?
            .error_for_status()?
            .json()?;
        job_id_of(&response).ok_or(LlmError::MissingJobId)
    }

    fn poll(&self, job_id: &str) -> Result<JobStatus, LlmError> {
        let url = format!("{}/api/jobs/{job_id}", self.base_url);
        let response: JobStatusResponse = self
            .authorize(self.client.get(&url))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.into_status())
    }
}

/// Accepts the job id as a JSON string or number.
fn job_id_of(response: &Value) -> Option<String> {
    match response.get("job_id")? {
        Value::String(id) if !id.is_empty() => Some(id.to_owned()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> JobStatus {
        serde_json::from_value::<JobStatusResponse>(value).unwrap().into_status()
    }

    #[test]
    fn job_ids() {
        assert_eq!(job_id_of(&json!({"job_id": "abc"})), Some("abc".to_owned()));
        assert_eq!(job_id_of(&json!({"job_id": 17})), Some("17".to_owned()));
        assert_eq!(job_id_of(&json!({"job_id": ""})), None);
        assert_eq!(job_id_of(&json!({"detail": "queue full"})), None);
    }

    #[test]
    fn statuses() {
        assert_eq!(status(json!({"status": "pending"})), JobStatus::Pending);
        assert_eq!(status(json!({"status": "running", "result": null})), JobStatus::Pending);
        assert_eq!(status(json!({"status": "done", "result": " SELECT 1 \n"})), JobStatus::Done("SELECT 1".to_owned()));
        assert_eq!(status(json!({"status": "done", "output": "Mostly north."})), JobStatus::Done("Mostly north.".to_owned()));
        assert_eq!(status(json!({"status": "error", "error": "OOM"})), JobStatus::Failed("OOM".to_owned()));
        assert_eq!(status(json!({"status": "error"})), JobStatus::Failed("Unknown error".to_owned()));
    }

    #[test]
    fn base_url_trailing_slash() {
        let service = HttpJobService::new("http://localhost:8000/", None);
        assert_eq!(service.base_url, "http://localhost:8000");
    }
}
