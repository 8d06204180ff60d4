use dashmap::DashMap;
use uuid::Uuid;

use crate::core::domain::{Problem, Submission, SubmissionResult, TestCase};
use crate::core::traits::store::{ProblemStore, StoreError, SubmissionStore};

/// In-memory problem catalog. Test cases are kept ordered by ordinal at
/// insertion time.
#[derive(Debug, Default)]
pub struct MemoryProblemStore {
    problems: DashMap<Uuid, Problem>,
    test_cases: DashMap<Uuid, Vec<TestCase>>,
}

impl MemoryProblemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, problem: Problem, mut test_cases: Vec<TestCase>) {
        test_cases.sort_by_key(|tc| tc.ordinal);
        self.test_cases.insert(problem.id, test_cases);
        self.problems.insert(problem.id, problem);
    }
}

#[async_trait::async_trait]
impl ProblemStore for MemoryProblemStore {
    async fn problem(&self, id: Uuid) -> Result<Option<Problem>, StoreError> {
        Ok(self.problems.get(&id).map(|entry| entry.clone()))
    }

    async fn test_cases(&self, problem_id: Uuid) -> Result<Vec<TestCase>, StoreError> {
        Ok(self
            .test_cases
            .get(&problem_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

/// In-memory submission store. A submission and its result rows live in
/// one map entry, so the write is atomic by construction: either the
/// whole grading pass is visible or none of it is.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    rows: DashMap<Uuid, (Submission, Vec<SubmissionResult>)>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn submission(&self, id: Uuid) -> Option<(Submission, Vec<SubmissionResult>)> {
        self.rows.get(&id).map(|entry| entry.clone())
    }
}

#[async_trait::async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn record(
        &self,
        submission: Submission,
        results: Vec<SubmissionResult>,
    ) -> Result<(), StoreError> {
        self.rows.insert(submission.id, (submission, results));
        Ok(())
    }

    async fn history(
        &self,
        problem_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Submission>, StoreError> {
        let mut submissions: Vec<Submission> = self
            .rows
            .iter()
            .map(|entry| entry.value().0.clone())
            .filter(|s| s.problem_id == problem_id && s.user_id == user_id)
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }
}
