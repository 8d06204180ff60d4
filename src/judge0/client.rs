use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::Judge0Config;
use crate::core::traits::executor::{EngineRun, ExecuteError, ExecutionRequest, Executor};

use super::mappers;
use super::models::{
    CreatedSubmission, EngineSubmission, MAX_OUTPUT_FILE_KB, MIN_CPU_TIME_SECS,
    MIN_MEMORY_LIMIT_MB, MIN_WALL_TIME_SECS, STATUS_PROCESSING, SubmissionPayload,
};

/// HTTP client for a Judge0-compatible engine.
///
/// The engine's submit-then-poll protocol stays internal: `execute`
/// submits the job, polls with exponential backoff until a terminal
/// status and returns the normalized run. Callers see one bounded
/// future-returning call.
#[derive(Clone, Debug)]
pub struct Judge0Client {
    http: reqwest::Client,
    config: Judge0Config,
}

impl Judge0Client {
    pub fn new(config: Judge0Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.config.api_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert("x-rapidapi-key", value);
            }
        }
        if let Some(host) = &self.config.api_host {
            if let Ok(value) = HeaderValue::from_str(host) {
                headers.insert("x-rapidapi-host", value);
            }
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<String, ExecuteError> {
        let response = self
            .http
            .post(self.url("/submissions?base64_encoded=true&wait=false"))
            .headers(self.headers())
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecuteError::Rejected {
                status: status.as_u16(),
            });
        }
        let created: CreatedSubmission =
            response.json().await.map_err(|err| ExecuteError::Protocol {
                msg: err.to_string(),
            })?;
        Ok(created.token)
    }

    async fn fetch(&self, token: &str) -> Result<EngineSubmission, ExecuteError> {
        let response = self
            .http
            .get(self.url(&format!("/submissions/{token}?base64_encoded=true")))
            .headers(self.headers())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecuteError::Rejected {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|err| ExecuteError::Protocol {
            msg: err.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Executor for Judge0Client {
    fn supports(&self, language: &str) -> bool {
        mappers::language_id(language).is_some()
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language))]
    async fn execute(&self, request: &ExecutionRequest) -> Result<EngineRun, ExecuteError> {
        let language_id = mappers::language_id(&request.language).ok_or_else(|| {
            ExecuteError::UnsupportedLanguage {
                language: request.language.clone(),
            }
        })?;

        let payload = build_payload(language_id, request);
        let token = self.submit(&payload).await?;
        tracing::debug!(%token, "job submitted");

        let mut interval = Duration::from_millis(self.config.poll_interval_ms);
        let cap = Duration::from_millis(self.config.poll_interval_cap_ms);
        for _ in 0..self.config.max_poll_attempts {
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(cap);

            let submission = self.fetch(&token).await?;
            match &submission.status {
                Some(status) if status.id > STATUS_PROCESSING => {
                    tracing::debug!(%token, status_id = status.id, "job terminal");
                    return mappers::normalize(submission, request);
                }
                _ => tracing::trace!(%token, "job still running"),
            }
        }
        Err(ExecuteError::PollDeadline)
    }
}

fn transport_error(err: reqwest::Error) -> ExecuteError {
    if err.is_decode() {
        ExecuteError::Protocol {
            msg: err.to_string(),
        }
    } else {
        ExecuteError::Unreachable {
            msg: err.to_string(),
        }
    }
}

fn build_payload(language_id: u32, request: &ExecutionRequest) -> SubmissionPayload {
    let cpu_time_limit = (request.time_limit_ms as f64 / 1000.0).max(MIN_CPU_TIME_SECS);
    SubmissionPayload {
        source_code: mappers::encode(&request.source_code),
        language_id,
        stdin: mappers::encode(&request.stdin),
        expected_output: mappers::encode(&request.expected_output),
        cpu_time_limit,
        memory_limit: request.memory_limit_mb.max(MIN_MEMORY_LIMIT_MB) * 1024,
        wall_time_limit: (cpu_time_limit * 2.0).max(MIN_WALL_TIME_SECS),
        max_file_size: MAX_OUTPUT_FILE_KB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge0::mappers::decode;

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            language: "python".to_string(),
            source_code: "print(42)".to_string(),
            stdin: "in".to_string(),
            expected_output: "42".to_string(),
            time_limit_ms: 2_000,
            memory_limit_mb: 256,
        }
    }

    #[test]
    fn payload_encodes_text_and_converts_units() {
        let payload = build_payload(71, &request());
        assert_eq!(decode(&payload.source_code), "print(42)");
        assert_eq!(decode(&payload.stdin), "in");
        assert_eq!(decode(&payload.expected_output), "42");
        assert_eq!(payload.cpu_time_limit, 2.0);
        assert_eq!(payload.memory_limit, 256 * 1024);
        assert_eq!(payload.wall_time_limit, 5.0);
    }

    #[test]
    fn payload_applies_engine_floors() {
        let mut tiny = request();
        tiny.time_limit_ms = 10;
        tiny.memory_limit_mb = 16;
        let payload = build_payload(71, &tiny);
        assert_eq!(payload.cpu_time_limit, MIN_CPU_TIME_SECS);
        assert_eq!(payload.memory_limit, MIN_MEMORY_LIMIT_MB * 1024);
        assert_eq!(payload.wall_time_limit, MIN_WALL_TIME_SECS);
    }

    #[test]
    fn client_reports_supported_runtimes() {
        let client = Judge0Client::new(Judge0Config::default()).expect("client builds");
        assert!(client.supports("python"));
        assert!(client.supports("c++"));
        assert!(!client.supports("brainfuck"));
    }

    #[test]
    fn base_url_join_tolerates_trailing_slash() {
        let config = Judge0Config {
            base_url: "http://localhost:2358/".to_string(),
            ..Judge0Config::default()
        };
        let client = Judge0Client::new(config).expect("client builds");
        assert_eq!(
            client.url("/submissions"),
            "http://localhost:2358/submissions"
        );
    }
}
