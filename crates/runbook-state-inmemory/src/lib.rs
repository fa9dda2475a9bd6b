//! In-memory state store implementation for the Runbook platform
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in the runbook-core crate. It is primarily useful
//! for development, testing, and single-process deployments where
//! persistence is not required.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{
    InMemoryApprovalRepository, InMemoryExecutionLogRepository, InMemoryExecutionRepository,
    InMemoryWorkflowRepository,
};

use runbook_core::{Approval, Execution, ExecutionLogEntry, Repositories, Workflow};

/// Provider for in-memory state store repositories
///
/// Repository handles created from one provider share storage, so the
/// engine and out-of-band readers observe the same documents.
pub struct InMemoryStateStoreProvider {
    // Shared storage for workflows
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,

    // Shared storage for executions
    executions: Arc<RwLock<HashMap<String, Execution>>>,

    // Shared storage for approvals
    approvals: Arc<RwLock<HashMap<String, Approval>>>,

    // Shared append-only audit log
    execution_log: Arc<RwLock<Vec<ExecutionLogEntry>>>,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
            executions: Arc::new(RwLock::new(HashMap::new())),
            approvals: Arc::new(RwLock::new(HashMap::new())),
            execution_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create the repository bundle for wiring a WorkflowEngine
    pub fn create_repositories(&self) -> Repositories {
        Repositories {
            workflows: Arc::new(InMemoryWorkflowRepository::new(self.workflows.clone())),
            executions: Arc::new(InMemoryExecutionRepository::new(self.executions.clone())),
            approvals: Arc::new(InMemoryApprovalRepository::new(self.approvals.clone())),
            execution_log: Arc::new(InMemoryExecutionLogRepository::new(
                self.execution_log.clone(),
            )),
        }
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
