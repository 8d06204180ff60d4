//! Submission evaluation orchestrator for a programming-problem catalog.
//!
//! Given a learner's code and a problem, the grader fans the problem's
//! test cases out to an external execution engine with bounded
//! concurrency, reduces the per-test outcomes into one verdict and
//! persists the submission atomically. Sandboxing, transport surfaces
//! and the problem/submission stores themselves live behind trait seams.

pub mod config;
pub mod constants;
pub mod core;
pub mod judge0;
pub mod scaffold;
pub mod store;
pub mod stubs;

pub use crate::config::{GraderConfig, Judge0Config};
pub use crate::core::domain::{
    ExecutionOutcome, GradeReport, GradeRequest, InputEncoding, Problem, Submission,
    SubmissionResult, TestCase, TestReport, Verdict,
};
pub use crate::core::grader::{GradeError, Grader};
pub use crate::core::traits::executor::{EngineRun, ExecuteError, ExecutionRequest, Executor};
pub use crate::core::traits::store::{ProblemStore, StoreError, SubmissionStore};
pub use crate::judge0::Judge0Client;
