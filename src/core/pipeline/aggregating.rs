use std::collections::HashMap;

use uuid::Uuid;

use crate::core::domain::{ExecutionOutcome, TestCase, Verdict};

/// Submission-level reduction of one complete outcome set.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateVerdict {
    pub status: Verdict,
    pub passed: u32,
    pub total: u32,
    /// Lowest-ordinal non-accepted test case; `None` iff `passed == total`.
    pub first_failing_test_case_id: Option<Uuid>,
    /// Maximum observed execution time across all tests.
    pub execution_time_ms: u64,
    /// Maximum observed memory across all tests.
    pub memory_kb: u64,
}

/// A broken outcome set is a fatal error, never silently tolerated: a
/// missing, unknown or duplicated outcome means the dispatcher and the
/// test-case set disagree.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AggregateError {
    #[error("incomplete result set: expected {expected} outcomes, received {received}")]
    IncompleteResults { expected: usize, received: usize },
    #[error("outcome for unknown test case {test_case_id}")]
    UnknownTestCase { test_case_id: Uuid },
    #[error("duplicate outcome for test case {test_case_id}")]
    DuplicateOutcome { test_case_id: Uuid },
}

/// Reduces a complete set of per-test outcomes into one verdict.
///
/// Pure over its inputs: outcomes are joined to their test cases by id and
/// scanned in ordinal order, so completion order never influences the
/// result. The final status is `Accepted` iff every test passed, otherwise
/// the verdict of the lowest-ordinal failing test — that test is what the
/// learner sees as the reason for failure.
pub fn aggregate(
    test_cases: &[TestCase],
    outcomes: &[ExecutionOutcome],
) -> Result<AggregateVerdict, AggregateError> {
    let mut by_id: HashMap<Uuid, &ExecutionOutcome> = HashMap::with_capacity(outcomes.len());
    for outcome in outcomes {
        if !test_cases.iter().any(|tc| tc.id == outcome.test_case_id) {
            return Err(AggregateError::UnknownTestCase {
                test_case_id: outcome.test_case_id,
            });
        }
        if by_id.insert(outcome.test_case_id, outcome).is_some() {
            return Err(AggregateError::DuplicateOutcome {
                test_case_id: outcome.test_case_id,
            });
        }
    }
    if by_id.len() != test_cases.len() {
        return Err(AggregateError::IncompleteResults {
            expected: test_cases.len(),
            received: by_id.len(),
        });
    }

    let mut ordered: Vec<&TestCase> = test_cases.iter().collect();
    ordered.sort_by_key(|tc| tc.ordinal);

    let mut passed = 0u32;
    let mut first_failing: Option<(Uuid, Verdict)> = None;
    let mut execution_time_ms = 0u64;
    let mut memory_kb = 0u64;

    for test_case in ordered {
        let outcome = by_id[&test_case.id];
        execution_time_ms = execution_time_ms.max(outcome.time_ms);
        memory_kb = memory_kb.max(outcome.memory_kb);
        if outcome.verdict.is_accepted() {
            passed += 1;
        } else if first_failing.is_none() {
            first_failing = Some((test_case.id, outcome.verdict));
        }
    }

    let (status, first_failing_test_case_id) = match first_failing {
        None => (Verdict::Accepted, None),
        Some((id, verdict)) => (verdict, Some(id)),
    };

    Ok(AggregateVerdict {
        status,
        passed,
        total: test_cases.len() as u32,
        first_failing_test_case_id,
        execution_time_ms,
        memory_kb,
    })
}
