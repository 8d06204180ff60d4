use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::config::GraderConfig;
use crate::core::domain::{ExecutionOutcome, Verdict};
use crate::core::traits::executor::{EngineRun, Executor, ExecutionRequest};

/// One test case prepared for the engine. The id travels with the unit so
/// the outcome can be re-associated explicitly; completion order is never
/// relied upon.
#[derive(Clone, Debug)]
pub struct DispatchUnit {
    pub test_case_id: Uuid,
    pub ordinal: u32,
    pub request: ExecutionRequest,
}

/// Only raised on the opt-in fail-fast path; graded failures never abort
/// a dispatch.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("execution engine unavailable while grading test case {test_case_id}: {msg}")]
    EngineUnavailable { test_case_id: Uuid, msg: String },
}

/// Fans all units out to the executor and collects one outcome per unit.
///
/// Permits come from the semaphore shared across grading requests, so the
/// total number of in-flight engine calls stays bounded system-wide. All
/// units run to completion even after graded failures; the aggregator
/// needs an exact passed/total count. Outcomes are returned in completion
/// order.
#[tracing::instrument(skip(units, executor, permits), fields(unit_count = units.len()))]
pub async fn dispatch(
    units: &[DispatchUnit],
    executor: &Arc<dyn Executor>,
    permits: &Arc<Semaphore>,
    config: &GraderConfig,
) -> Result<Vec<ExecutionOutcome>, DispatchError> {
    let mut futures = FuturesUnordered::new();
    for (unit_idx, unit) in units.iter().enumerate() {
        let executor = executor.clone();
        let permits = permits.clone();
        futures.push(async move {
            let outcome = execute_unit(unit, &executor, &permits, config).await;
            (unit_idx, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(units.len());
    while let Some((unit_idx, outcome)) = futures.next().await {
        tracing::debug!(
            unit_idx,
            test_case_id = %outcome.test_case_id,
            verdict = %outcome.verdict,
            "unit finished"
        );
        if config.fail_fast_on_infra && outcome.verdict == Verdict::JudgeError {
            return Err(DispatchError::EngineUnavailable {
                test_case_id: outcome.test_case_id,
                msg: outcome.stderr,
            });
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Runs one unit to an outcome. Infrastructure errors are retried with
/// exponential backoff; grading verdicts are final on the first attempt.
/// Each attempt is bounded by the unit watchdog (problem time limit plus
/// protocol overhead); an attempt that outlives it becomes a
/// `TimeLimitExceeded` outcome without blocking the other units.
async fn execute_unit(
    unit: &DispatchUnit,
    executor: &Arc<dyn Executor>,
    permits: &Arc<Semaphore>,
    config: &GraderConfig,
) -> ExecutionOutcome {
    let watchdog_ms = unit.request.time_limit_ms + config.protocol_overhead_ms;
    let watchdog = Duration::from_millis(watchdog_ms);
    let mut attempt = 0u32;
    loop {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return ExecutionOutcome::judge_error(
                    unit.test_case_id,
                    "engine permit pool closed",
                );
            }
        };
        let run = tokio::time::timeout(watchdog, executor.execute(&unit.request)).await;
        drop(permit);

        match run {
            Err(_) => {
                tracing::debug!(
                    test_case_id = %unit.test_case_id,
                    watchdog_ms,
                    "watchdog elapsed"
                );
                return ExecutionOutcome::time_limit_exceeded(unit.test_case_id, watchdog_ms);
            }
            Ok(Ok(engine_run)) => return (unit.test_case_id, engine_run).into(),
            Ok(Err(err)) => {
                if attempt >= config.max_retries {
                    tracing::error!(
                        test_case_id = %unit.test_case_id,
                        error = %err,
                        "infrastructure retries exhausted"
                    );
                    return ExecutionOutcome::judge_error(unit.test_case_id, err.to_string());
                }
                let backoff = Duration::from_millis(config.retry_backoff_ms << attempt);
                tracing::warn!(
                    test_case_id = %unit.test_case_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying unit after infrastructure error"
                );
                attempt += 1;
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

impl From<(Uuid, EngineRun)> for ExecutionOutcome {
    fn from((test_case_id, run): (Uuid, EngineRun)) -> Self {
        Self {
            test_case_id,
            status_id: Some(run.status_id),
            status: run.status,
            verdict: run.verdict,
            stdout: run.stdout,
            stderr: run.stderr,
            compile_output: run.compile_output,
            time_ms: run.time_ms,
            memory_kb: run.memory_kb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::executor::{ExecuteError, MockExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn accepted_run(stdout: &str, time_ms: u64) -> EngineRun {
        EngineRun {
            status_id: 3,
            status: "Accepted".to_string(),
            verdict: Verdict::Accepted,
            stdout: stdout.to_string(),
            stderr: String::new(),
            compile_output: None,
            time_ms,
            memory_kb: 512,
        }
    }

    fn unit(ordinal: u32, stdin: &str, expected: &str) -> DispatchUnit {
        DispatchUnit {
            test_case_id: Uuid::new_v4(),
            ordinal,
            request: ExecutionRequest {
                language: "python".to_string(),
                source_code: "print(input())".to_string(),
                stdin: stdin.to_string(),
                expected_output: expected.to_string(),
                time_limit_ms: 1_000,
                memory_limit_mb: 128,
            },
        }
    }

    fn fast_config() -> GraderConfig {
        GraderConfig {
            retry_backoff_ms: 1,
            ..GraderConfig::default()
        }
    }

    /// Sleeps for the number of milliseconds given on stdin, then echoes
    /// the expected output. Lets tests scramble completion order.
    #[derive(Debug)]
    struct EchoExecutor;

    #[async_trait::async_trait]
    impl Executor for EchoExecutor {
        fn supports(&self, _language: &str) -> bool {
            true
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<EngineRun, ExecuteError> {
            let delay: u64 = request.stdin.trim().parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(accepted_run(&request.expected_output, delay))
        }
    }

    #[tokio::test]
    async fn outcomes_reassociate_under_scrambled_completion() {
        // The slowest unit is first by ordinal, so completion order is the
        // reverse of submission order.
        let units = vec![
            unit(1, "60", "first"),
            unit(2, "30", "second"),
            unit(3, "5", "third"),
        ];
        let executor: Arc<dyn Executor> = Arc::new(EchoExecutor);
        let permits = Arc::new(Semaphore::new(4));

        let outcomes = dispatch(&units, &executor, &permits, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        for u in &units {
            let outcome = outcomes
                .iter()
                .find(|o| o.test_case_id == u.test_case_id)
                .expect("every unit yields exactly one outcome");
            assert_eq!(outcome.stdout, u.request.expected_output);
            assert_eq!(outcome.verdict, Verdict::Accepted);
        }
        // Completion order really was scrambled.
        assert_eq!(outcomes[0].test_case_id, units[2].test_case_id);
    }

    #[tokio::test]
    async fn infra_errors_are_retried_then_succeed() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .times(2)
            .returning(|_| {
                Err(ExecuteError::Unreachable {
                    msg: "connection refused".to_string(),
                })
            });
        executor
            .expect_execute()
            .times(1)
            .returning(|_| Ok(accepted_run("42", 10)));
        let executor: Arc<dyn Executor> = Arc::new(executor);
        let permits = Arc::new(Semaphore::new(1));

        let units = vec![unit(1, "", "42")];
        let outcomes = dispatch(&units, &executor, &permits, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].verdict, Verdict::Accepted);
        assert_eq!(outcomes[0].stdout, "42");
    }

    #[tokio::test]
    async fn exhausted_retries_become_a_judge_error_outcome() {
        let mut executor = MockExecutor::new();
        // Initial attempt plus max_retries.
        executor.expect_execute().times(3).returning(|_| {
            Err(ExecuteError::Unreachable {
                msg: "connection refused".to_string(),
            })
        });
        let executor: Arc<dyn Executor> = Arc::new(executor);
        let permits = Arc::new(Semaphore::new(1));

        let units = vec![unit(1, "", "42")];
        let outcomes = dispatch(&units, &executor, &permits, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].verdict, Verdict::JudgeError);
        assert!(outcomes[0].stderr.contains("unreachable"));
        assert_eq!(outcomes[0].status_id, None);
    }

    #[tokio::test]
    async fn grading_verdicts_are_never_retried() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().times(1).returning(|_| {
            Ok(EngineRun {
                status_id: 4,
                status: "Wrong Answer".to_string(),
                verdict: Verdict::WrongAnswer,
                stdout: "41".to_string(),
                stderr: String::new(),
                compile_output: None,
                time_ms: 8,
                memory_kb: 256,
            })
        });
        let executor: Arc<dyn Executor> = Arc::new(executor);
        let permits = Arc::new(Semaphore::new(1));

        let units = vec![unit(1, "", "42")];
        let outcomes = dispatch(&units, &executor, &permits, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcomes[0].verdict, Verdict::WrongAnswer);
    }

    #[tokio::test]
    async fn watchdog_converts_stalls_into_time_limit_exceeded() {
        #[derive(Debug)]
        struct StalledExecutor;

        #[async_trait::async_trait]
        impl Executor for StalledExecutor {
            fn supports(&self, _language: &str) -> bool {
                true
            }

            async fn execute(
                &self,
                _request: &ExecutionRequest,
            ) -> Result<EngineRun, ExecuteError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(accepted_run("", 0))
            }
        }

        let mut slow_unit = unit(1, "", "42");
        slow_unit.request.time_limit_ms = 10;
        let config = GraderConfig {
            protocol_overhead_ms: 20,
            ..fast_config()
        };
        let executor: Arc<dyn Executor> = Arc::new(StalledExecutor);
        let permits = Arc::new(Semaphore::new(1));

        let outcomes = dispatch(&[slow_unit], &executor, &permits, &config)
            .await
            .unwrap();

        assert_eq!(outcomes[0].verdict, Verdict::TimeLimitExceeded);
        assert_eq!(outcomes[0].time_ms, 30);
    }

    #[tokio::test]
    async fn fail_fast_aborts_on_infrastructure_exhaustion() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().returning(|_| {
            Err(ExecuteError::Unreachable {
                msg: "connection refused".to_string(),
            })
        });
        let executor: Arc<dyn Executor> = Arc::new(executor);
        let permits = Arc::new(Semaphore::new(2));
        let config = GraderConfig {
            max_retries: 0,
            fail_fast_on_infra: true,
            ..fast_config()
        };

        let units = vec![unit(1, "", "a"), unit(2, "", "b")];
        let err = dispatch(&units, &executor, &permits, &config)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::EngineUnavailable { .. }));
    }

    #[tokio::test]
    async fn in_flight_units_never_exceed_the_permit_count() {
        #[derive(Debug)]
        struct CountingExecutor {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Executor for CountingExecutor {
            fn supports(&self, _language: &str) -> bool {
                true
            }

            async fn execute(
                &self,
                request: &ExecutionRequest,
            ) -> Result<EngineRun, ExecuteError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(accepted_run(&request.expected_output, 20))
            }
        }

        let counting = Arc::new(CountingExecutor {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let executor: Arc<dyn Executor> = counting.clone();
        let permits = Arc::new(Semaphore::new(2));

        let units: Vec<_> = (1..=6).map(|i| unit(i, "", "out")).collect();
        let outcomes = dispatch(&units, &executor, &permits, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 6);
        assert!(counting.peak.load(Ordering::SeqCst) <= 2);
    }
}
