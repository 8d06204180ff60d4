use uuid::Uuid;

use crate::core::domain::{Problem, Submission, SubmissionResult, TestCase};

#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("store unavailable: {msg}")]
    Unavailable { msg: String },
}

/// Read access to the problem catalog and its test cases.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProblemStore: std::fmt::Debug + Send + Sync {
    async fn problem(&self, id: Uuid) -> Result<Option<Problem>, StoreError>;

    /// All test cases of a problem (hidden ones included), ordered by
    /// ordinal.
    async fn test_cases(&self, problem_id: Uuid) -> Result<Vec<TestCase>, StoreError>;
}

/// Write access for finalized grading passes.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SubmissionStore: std::fmt::Debug + Send + Sync {
    /// Persists a submission together with all of its per-test rows in
    /// one atomic write. A submission without its result rows must never
    /// become observable.
    async fn record(
        &self,
        submission: Submission,
        results: Vec<SubmissionResult>,
    ) -> Result<(), StoreError>;

    /// Past submissions of one user on one problem, newest first.
    async fn history(&self, problem_id: Uuid, user_id: Uuid) -> Result<Vec<Submission>, StoreError>;
}
