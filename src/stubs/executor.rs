use std::time::Duration;

use crate::core::traits::executor::{EngineRun, ExecuteError, ExecutionRequest, Executor};

/// Executor that resolves to a fixed result after a delay. Stands in for
/// the real engine in the demo binary and in tests.
#[derive(Debug, Clone)]
pub struct ExecutorStub {
    result: Result<EngineRun, ExecuteError>,
    delay: Duration,
}

impl ExecutorStub {
    pub fn new(result: Result<EngineRun, ExecuteError>, delay: Duration) -> Self {
        Self { result, delay }
    }
}

#[async_trait::async_trait]
impl Executor for ExecutorStub {
    fn supports(&self, _language: &str) -> bool {
        true
    }

    #[tracing::instrument]
    async fn execute(&self, request: &ExecutionRequest) -> Result<EngineRun, ExecuteError> {
        tracing::debug!(
            "Start execution: language={:?}, stdin={:?}, time_limit_ms={:?}",
            request.language,
            request.stdin,
            request.time_limit_ms
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Execution result: {:?}", self.result);

        self.result.clone()
    }
}
