//! Small async helpers shared by the test suites.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use runbook_core::{Approval, Execution, ExecutionId, WorkflowEngine};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls the engine until the execution reaches a terminal status.
///
/// Panics when the deadline passes first; a stuck execution is a test
/// failure, not a condition to handle.
pub async fn wait_for_terminal(
    engine: &WorkflowEngine,
    execution_id: &ExecutionId,
    timeout: Duration,
) -> Execution {
    let deadline = Instant::now() + timeout;
    loop {
        let execution = engine
            .get_execution(execution_id)
            .await
            .expect("execution should exist");
        if execution.status.is_terminal() {
            return execution;
        }
        if Instant::now() >= deadline {
            panic!(
                "execution {} still {:?} after {:?}",
                execution_id.0, execution.status, timeout
            );
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Polls the engine until some approval is pending, returning the first.
pub async fn wait_for_pending_approval(engine: &WorkflowEngine, timeout: Duration) -> Approval {
    let deadline = Instant::now() + timeout;
    loop {
        let pending = engine
            .pending_approvals()
            .await
            .expect("pending approvals should list");
        if let Some(approval) = pending.into_iter().next() {
            return approval;
        }
        if Instant::now() >= deadline {
            panic!("no approval became pending within {:?}", timeout);
        }
        sleep(POLL_INTERVAL).await;
    }
}
