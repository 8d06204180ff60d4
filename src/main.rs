use std::panic;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use codegrader::config::{GraderConfig, Judge0Config};
use codegrader::core::domain::{GradeRequest, InputEncoding, Problem, TestCase, Verdict};
use codegrader::core::grader::Grader;
use codegrader::core::traits::executor::{EngineRun, Executor};
use codegrader::judge0::Judge0Client;
use codegrader::store::memory::{MemoryProblemStore, MemorySubmissionStore};
use codegrader::stubs::executor::ExecutorStub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    // Grade one sample submission against a real engine when configured,
    // otherwise against the stub.
    let executor: Arc<dyn Executor> = if std::env::var("JUDGE0_URL").is_ok() {
        Arc::new(Judge0Client::new(Judge0Config::from_env())?)
    } else {
        tracing::info!("JUDGE0_URL not set, using the stub executor");
        Arc::new(ExecutorStub::new(
            Ok(EngineRun {
                status_id: 3,
                status: "Accepted".to_string(),
                verdict: Verdict::Accepted,
                stdout: "3".to_string(),
                stderr: String::new(),
                compile_output: None,
                time_ms: 12,
                memory_kb: 640,
            }),
            Duration::from_millis(100),
        ))
    };

    let problem = Problem {
        id: Uuid::new_v4(),
        title: "Add Two Numbers".to_string(),
        parameters: "a: int, b: int".to_string(),
        time_limit_ms: 2_000,
        memory_limit_mb: 128,
    };
    let test_cases = vec![
        TestCase {
            id: Uuid::new_v4(),
            problem_id: problem.id,
            ordinal: 1,
            input: "1, 2".to_string(),
            expected_output: "3".to_string(),
            hidden: false,
            weight: 1.0,
            input_encoding: InputEncoding::Json,
        },
        TestCase {
            id: Uuid::new_v4(),
            problem_id: problem.id,
            ordinal: 2,
            input: "2, 1".to_string(),
            expected_output: "3".to_string(),
            hidden: true,
            weight: 1.0,
            input_encoding: InputEncoding::Json,
        },
    ];

    let problems = Arc::new(MemoryProblemStore::new());
    problems.insert(problem.clone(), test_cases);
    let submissions = Arc::new(MemorySubmissionStore::new());

    let grader = Grader::new(executor, problems, submissions, GraderConfig::default());

    let report = grader
        .grade(GradeRequest {
            user_id: Uuid::new_v4(),
            problem_id: problem.id,
            language: "python".to_string(),
            code: "def add(a, b):\n    return a + b".to_string(),
            function_name: "add".to_string(),
        })
        .await?;

    tracing::info!(
        submission_id = %report.submission_id,
        status = %report.status,
        passed = report.passed,
        total = report.total,
        execution_time_ms = report.execution_time_ms,
        memory_kb = report.memory_kb,
        "graded sample submission"
    );

    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
