use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::GraderConfig;
use crate::constants::MAX_CODE_SIZE_BYTES;
use crate::core::domain::{GradeReport, GradeRequest, InputEncoding, Problem, Submission, TestCase};
use crate::core::pipeline::aggregating::{self, AggregateError};
use crate::core::pipeline::dispatching::{self, DispatchError, DispatchUnit};
use crate::core::pipeline::recording;
use crate::core::traits::executor::{ExecutionRequest, Executor};
use crate::core::traits::store::{ProblemStore, StoreError, SubmissionStore};
use crate::scaffold;

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("invalid request: {msg}")]
    InvalidRequest { msg: String },
    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },
    #[error("problem not found: {problem_id}")]
    ProblemNotFound { problem_id: Uuid },
    #[error("problem {problem_id} has no test cases")]
    NoTestCases { problem_id: Uuid },
    #[error("execution engine unavailable: {msg}")]
    EngineUnavailable { msg: String },
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
    #[error("grading request exceeded the overall deadline")]
    DeadlineExceeded,
}

/// Orchestrates one grading pass: load the problem and its test cases,
/// fan the tests out to the execution engine, reduce the outcomes to a
/// verdict and persist it.
///
/// One instance serves many concurrent grading requests; its semaphore
/// bounds the total number of in-flight engine calls across all of them.
/// `grade` is an ordinary future: dropping it cancels every in-flight
/// per-test call, and since persistence runs strictly after fan-in, a
/// cancelled request leaves no partial submission behind.
#[derive(Clone, Debug)]
pub struct Grader {
    executor: Arc<dyn Executor>,
    problems: Arc<dyn ProblemStore>,
    submissions: Arc<dyn SubmissionStore>,
    engine_permits: Arc<Semaphore>,
    config: GraderConfig,
}

impl Grader {
    pub fn new(
        executor: Arc<dyn Executor>,
        problems: Arc<dyn ProblemStore>,
        submissions: Arc<dyn SubmissionStore>,
        config: GraderConfig,
    ) -> Self {
        let engine_permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            executor,
            problems,
            submissions,
            engine_permits,
            config,
        }
    }

    #[tracing::instrument(skip(self, request), fields(
        user_id = %request.user_id,
        problem_id = %request.problem_id,
        language = %request.language,
    ))]
    pub async fn grade(&self, request: GradeRequest) -> Result<GradeReport, GradeError> {
        self.validate(&request)?;
        let submitted_at = Utc::now();

        let problem = self
            .problems
            .problem(request.problem_id)
            .await?
            .ok_or(GradeError::ProblemNotFound {
                problem_id: request.problem_id,
            })?;
        let test_cases = self.problems.test_cases(request.problem_id).await?;
        if test_cases.is_empty() {
            return Err(GradeError::NoTestCases {
                problem_id: request.problem_id,
            });
        }

        let units = build_units(&request, &problem, &test_cases)?;
        let deadline = self.overall_deadline(&problem, units.len());
        tracing::info!(
            test_count = units.len(),
            deadline_ms = deadline.as_millis() as u64,
            "dispatching submission"
        );

        let dispatched = tokio::time::timeout(
            deadline,
            dispatching::dispatch(&units, &self.executor, &self.engine_permits, &self.config),
        )
        .await;
        let outcomes = match dispatched {
            Err(_) => {
                tracing::error!("grading request exceeded the overall deadline");
                return Err(GradeError::DeadlineExceeded);
            }
            Ok(Err(DispatchError::EngineUnavailable { msg, .. })) => {
                return Err(GradeError::EngineUnavailable { msg });
            }
            Ok(Ok(outcomes)) => outcomes,
        };

        let verdict = aggregating::aggregate(&test_cases, &outcomes)?;
        let report = recording::record(
            &self.submissions,
            &request,
            &test_cases,
            &outcomes,
            &verdict,
            submitted_at,
        )
        .await?;
        Ok(report)
    }

    /// Past submissions of one user on one problem, newest first.
    pub async fn history(
        &self,
        problem_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Submission>, GradeError> {
        Ok(self.submissions.history(problem_id, user_id).await?)
    }

    fn validate(&self, request: &GradeRequest) -> Result<(), GradeError> {
        if request.code.trim().is_empty() {
            return Err(GradeError::InvalidRequest {
                msg: "code is empty".to_string(),
            });
        }
        if request.code.len() > MAX_CODE_SIZE_BYTES {
            return Err(GradeError::InvalidRequest {
                msg: format!("code is too large: {} bytes", request.code.len()),
            });
        }
        if !self.executor.supports(&request.language) {
            return Err(GradeError::UnsupportedLanguage {
                language: request.language.clone(),
            });
        }
        Ok(())
    }

    /// Guard against systemic stalls only; individual tests are bounded
    /// by their own watchdogs.
    fn overall_deadline(&self, problem: &Problem, unit_count: usize) -> Duration {
        let watchdog_ms = problem.time_limit_ms + self.config.protocol_overhead_ms;
        let concurrency = self.config.concurrency.max(1) as u64;
        let budget_ms =
            (watchdog_ms * unit_count as u64).div_ceil(concurrency) + self.config.deadline_margin_ms;
        Duration::from_millis(budget_ms)
    }
}

/// Prepares one engine request per test case. Stdin-encoded tests ship
/// the code verbatim with the input piped; JSON-encoded tests get a
/// generated program with the argument payload embedded.
fn build_units(
    request: &GradeRequest,
    problem: &Problem,
    test_cases: &[TestCase],
) -> Result<Vec<DispatchUnit>, GradeError> {
    let parameters = scaffold::parse_parameters(&problem.parameters);
    test_cases
        .iter()
        .map(|tc| {
            let (source_code, stdin) = match tc.input_encoding {
                InputEncoding::Stdin => (request.code.clone(), tc.input.clone()),
                InputEncoding::Json => {
                    if request.function_name.trim().is_empty() {
                        return Err(GradeError::InvalidRequest {
                            msg: "function name is required for JSON-encoded test cases"
                                .to_string(),
                        });
                    }
                    let values = scaffold::parse_input_values(&tc.input);
                    let json_input = scaffold::build_json_input(&values, &parameters);
                    let program = scaffold::build_program(
                        &request.language,
                        &request.code,
                        &request.function_name,
                        &json_input,
                    )
                    .map_err(|err| GradeError::InvalidRequest {
                        msg: err.to_string(),
                    })?;
                    (program, String::new())
                }
            };
            Ok(DispatchUnit {
                test_case_id: tc.id,
                ordinal: tc.ordinal,
                request: ExecutionRequest {
                    language: request.language.clone(),
                    source_code,
                    stdin,
                    expected_output: tc.expected_output.clone(),
                    time_limit_ms: problem.time_limit_ms,
                    memory_limit_mb: problem.memory_limit_mb,
                },
            })
        })
        .collect()
}
