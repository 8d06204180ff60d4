use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::domain::{
    ExecutionOutcome, GradeReport, GradeRequest, Submission, SubmissionResult, TestCase,
    TestReport, Verdict,
};
use crate::core::pipeline::aggregating::AggregateVerdict;
use crate::core::traits::store::{StoreError, SubmissionStore};

/// Persists one grading pass and builds the caller-facing report.
///
/// The submission and all of its result rows go through the store in a
/// single atomic write; this function runs strictly after fan-in and
/// aggregation, so a cancelled or failed request leaves nothing behind.
#[tracing::instrument(skip_all, fields(user_id = %request.user_id, problem_id = %request.problem_id))]
pub async fn record(
    store: &Arc<dyn SubmissionStore>,
    request: &GradeRequest,
    test_cases: &[TestCase],
    outcomes: &[ExecutionOutcome],
    verdict: &AggregateVerdict,
    submitted_at: DateTime<Utc>,
) -> Result<GradeReport, StoreError> {
    let (submission, results) = build_rows(request, test_cases, outcomes, verdict, submitted_at);
    let report = build_report(&submission, test_cases, outcomes);

    store.record(submission, results).await?;

    tracing::info!(
        submission_id = %report.submission_id,
        status = %report.status,
        passed = report.passed,
        total = report.total,
        "submission recorded"
    );
    Ok(report)
}

/// Materializes the rows for one grading pass. Result rows are emitted in
/// ordinal order, one per test case.
pub fn build_rows(
    request: &GradeRequest,
    test_cases: &[TestCase],
    outcomes: &[ExecutionOutcome],
    verdict: &AggregateVerdict,
    submitted_at: DateTime<Utc>,
) -> (Submission, Vec<SubmissionResult>) {
    let submission_id = Uuid::new_v4();
    let by_id: HashMap<Uuid, &ExecutionOutcome> =
        outcomes.iter().map(|o| (o.test_case_id, o)).collect();

    let mut ordered: Vec<&TestCase> = test_cases.iter().collect();
    ordered.sort_by_key(|tc| tc.ordinal);

    let results = ordered
        .iter()
        .filter_map(|tc| {
            by_id.get(&tc.id).map(|outcome| SubmissionResult {
                id: Uuid::new_v4(),
                submission_id,
                test_case_id: tc.id,
                status: outcome.verdict,
                execution_time_ms: outcome.time_ms,
                memory_kb: outcome.memory_kb,
            })
        })
        .collect();

    let submission = Submission {
        id: submission_id,
        user_id: request.user_id,
        problem_id: request.problem_id,
        code: request.code.clone(),
        language: request.language.clone(),
        submitted_at,
        status: verdict.status,
        execution_time_ms: verdict.execution_time_ms,
        memory_kb: verdict.memory_kb,
        tests_passed: verdict.passed,
        tests_total: verdict.total,
        first_failing_test_case_id: verdict.first_failing_test_case_id,
    };

    (submission, results)
}

/// Builds the response DTO. Hidden tests keep their verdict and resource
/// figures but lose stdout/stderr and the expected output.
pub fn build_report(
    submission: &Submission,
    test_cases: &[TestCase],
    outcomes: &[ExecutionOutcome],
) -> GradeReport {
    let by_id: HashMap<Uuid, &ExecutionOutcome> =
        outcomes.iter().map(|o| (o.test_case_id, o)).collect();

    let mut ordered: Vec<&TestCase> = test_cases.iter().collect();
    ordered.sort_by_key(|tc| tc.ordinal);

    let tests = ordered
        .iter()
        .filter_map(|tc| {
            by_id.get(&tc.id).map(|outcome| TestReport {
                test_case_id: tc.id,
                ordinal: tc.ordinal,
                status: outcome.verdict,
                execution_time_ms: outcome.time_ms,
                memory_kb: outcome.memory_kb,
                hidden: tc.hidden,
                stdout: (!tc.hidden).then(|| outcome.stdout.clone()),
                stderr: (!tc.hidden).then(|| outcome.stderr.clone()),
                expected_output: (!tc.hidden).then(|| tc.expected_output.clone()),
                compile_output: outcome.compile_output.clone(),
            })
        })
        .collect();

    GradeReport {
        submission_id: submission.id,
        status: submission.status,
        passed: submission.tests_passed,
        total: submission.tests_total,
        execution_time_ms: submission.execution_time_ms,
        memory_kb: submission.memory_kb,
        first_failing_test_case_id: submission.first_failing_test_case_id,
        system_error: outcomes.iter().any(|o| o.verdict == Verdict::JudgeError),
        tests,
    }
}
