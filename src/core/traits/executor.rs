use crate::core::domain::Verdict;

/// One unit of work for the execution engine: run `source_code` once with
/// `stdin` and judge the output against `expected_output`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionRequest {
    pub language: String,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

/// Normalized result of one engine run. Grading outcomes are values here;
/// only infrastructure failures travel as [`ExecuteError`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRun {
    pub status_id: i32,
    pub status: String,
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: Option<String>,
    pub time_ms: u64,
    pub memory_kb: u64,
}

/// Infrastructure failures of the execution client. A caller must never
/// confuse these with grading verdicts; they are retryable, verdicts are
/// not.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("execution engine unreachable: {msg}")]
    Unreachable { msg: String },
    #[error("malformed engine response: {msg}")]
    Protocol { msg: String },
    #[error("engine rejected the job: http status {status}")]
    Rejected { status: u16 },
    #[error("engine reported an internal failure: {status}")]
    EngineInternal { status: String },
    #[error("job did not reach a terminal state within the poll budget")]
    PollDeadline,
    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },
}

/// Adapter over the external execution engine. Submit-then-poll is
/// collapsed behind the single `execute` call; the future resolves once
/// the job reaches a terminal state.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Executor: std::fmt::Debug + Send + Sync {
    /// Whether `language` maps to a runtime on the engine.
    fn supports(&self, language: &str) -> bool;

    async fn execute(&self, request: &ExecutionRequest) -> Result<EngineRun, ExecuteError>;
}
