use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalized grading outcome for one test case or a whole submission.
///
/// `JudgeError` marks a unit the engine could not grade even after
/// retries. It counts as failing during aggregation, but is kept distinct
/// from grading verdicts so a caller can offer "retry submission" instead
/// of showing a definitive wrong answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    JudgeError,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompilationError => "Compilation Error",
            Verdict::JudgeError => "Judge Error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    /// Declared parameter list of the solution function, e.g.
    /// `"nums: int[], target: int"`.
    pub parameters: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

/// How a test case's input payload reaches the learner's program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEncoding {
    /// Argument list scaffolded into a generated program around the
    /// learner's function.
    Json,
    /// Piped to the program verbatim; the code is submitted as-is.
    Stdin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Uuid,
    pub problem_id: Uuid,
    /// Position within the problem. Unique per problem; defines reporting
    /// order and the first-failing tie-break, not execution order.
    pub ordinal: u32,
    pub input: String,
    pub expected_output: String,
    /// Hidden tests are graded, but their input and output are never
    /// surfaced to the learner.
    pub hidden: bool,
    /// Reserved for weighted scoring; unused today.
    pub weight: f32,
    pub input_encoding: InputEncoding,
}

/// Result of running one test case, keyed by the originating test case id
/// because completion order carries no meaning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub test_case_id: Uuid,
    /// Raw engine status; absent for outcomes synthesized locally
    /// (watchdog timeouts, exhausted retries).
    pub status_id: Option<i32>,
    pub status: String,
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: Option<String>,
    pub time_ms: u64,
    pub memory_kb: u64,
}

impl ExecutionOutcome {
    /// Outcome for a unit whose watchdog elapsed before the engine
    /// reached a terminal state.
    pub fn time_limit_exceeded(test_case_id: Uuid, watchdog_ms: u64) -> Self {
        Self {
            test_case_id,
            status_id: None,
            status: Verdict::TimeLimitExceeded.to_string(),
            verdict: Verdict::TimeLimitExceeded,
            stdout: String::new(),
            stderr: String::new(),
            compile_output: None,
            time_ms: watchdog_ms,
            memory_kb: 0,
        }
    }

    /// Outcome for a unit that exhausted its infrastructure retries.
    pub fn judge_error(test_case_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            test_case_id,
            status_id: None,
            status: Verdict::JudgeError.to_string(),
            verdict: Verdict::JudgeError,
            stdout: String::new(),
            stderr: message.into(),
            compile_output: None,
            time_ms: 0,
            memory_kb: 0,
        }
    }
}

/// Aggregate root persisted once per grading pass. Immutable after the
/// aggregator finalizes it; never updated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub code: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
    pub status: Verdict,
    /// Maximum observed execution time across all tests.
    pub execution_time_ms: u64,
    /// Maximum observed memory across all tests.
    pub memory_kb: u64,
    pub tests_passed: u32,
    pub tests_total: u32,
    /// Lowest-ordinal failing test case; `None` iff every test passed.
    pub first_failing_test_case_id: Option<Uuid>,
}

/// One row per (submission, test case). Owned exclusively by its
/// submission and written in the same transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub test_case_id: Uuid,
    pub status: Verdict,
    pub execution_time_ms: u64,
    pub memory_kb: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradeRequest {
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub language: String,
    pub code: String,
    pub function_name: String,
}

/// Caller-facing response for one grading pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradeReport {
    pub submission_id: Uuid,
    pub status: Verdict,
    pub passed: u32,
    pub total: u32,
    pub execution_time_ms: u64,
    pub memory_kb: u64,
    pub first_failing_test_case_id: Option<Uuid>,
    /// Set when any unit ended in `JudgeError`; the verdict is then not a
    /// statement about the learner's code.
    pub system_error: bool,
    pub tests: Vec<TestReport>,
}

/// Per-test view in the report. Output fields are `None` for hidden
/// tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestReport {
    pub test_case_id: Uuid,
    pub ordinal: u32,
    pub status: Verdict,
    pub execution_time_ms: u64,
    pub memory_kb: u64,
    pub hidden: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub expected_output: Option<String>,
    pub compile_output: Option<String>,
}
