use serde::Deserialize;

/// Tunables for one [`Grader`](crate::core::grader::Grader) instance.
///
/// `concurrency` sizes the semaphore shared by every grading request the
/// instance serves; it is the admission-control knob against the external
/// engine.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    /// Maximum in-flight engine calls across all concurrent grading
    /// requests.
    pub concurrency: usize,
    /// Infrastructure-error retries per test-case unit. Grading verdicts
    /// are never retried.
    pub max_retries: u32,
    /// Base delay before the first retry; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Allowance added to a problem's time limit to form the per-unit
    /// watchdog, covering submit/poll protocol overhead.
    pub protocol_overhead_ms: u64,
    /// Margin added to the overall grading deadline.
    pub deadline_margin_ms: u64,
    /// Abort the whole dispatch once a unit exhausts its retries on an
    /// infrastructure error. Graded failures never trigger this.
    pub fail_fast_on_infra: bool,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_retries: 2,
            retry_backoff_ms: 250,
            protocol_overhead_ms: 2_000,
            deadline_margin_ms: 5_000,
            fail_fast_on_infra: false,
        }
    }
}

/// Connection settings for the Judge0-compatible execution engine.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Judge0Config {
    pub base_url: String,
    /// RapidAPI-style credentials; sent as headers when present.
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub request_timeout_ms: u64,
    /// First poll delay; doubles per poll up to `poll_interval_cap_ms`.
    pub poll_interval_ms: u64,
    pub poll_interval_cap_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for Judge0Config {
    fn default() -> Self {
        Self {
            base_url: "https://judge0-ce.p.rapidapi.com".to_string(),
            api_key: None,
            api_host: None,
            request_timeout_ms: 10_000,
            poll_interval_ms: 250,
            poll_interval_cap_ms: 2_000,
            max_poll_attempts: 20,
        }
    }
}

impl Judge0Config {
    /// Reads the engine endpoint and credentials from the environment,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("JUDGE0_URL") {
            config.base_url = url;
        }
        config.api_key = std::env::var("JUDGE0_API_KEY").ok();
        config.api_host = std::env::var("JUDGE0_API_HOST").ok();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grader_config_defaults_are_sane() {
        let config = GraderConfig::default();
        assert!(config.concurrency >= 1);
        assert_eq!(config.max_retries, 2);
        assert!(!config.fail_fast_on_infra);
    }

    #[test]
    fn grader_config_fills_unset_fields_from_defaults() {
        let config: GraderConfig =
            serde_json::from_str(r#"{"concurrency": 2, "fail_fast_on_infra": true}"#)
                .expect("valid config");
        assert_eq!(config.concurrency, 2);
        assert!(config.fail_fast_on_infra);
        assert_eq!(config.max_retries, GraderConfig::default().max_retries);
    }
}
