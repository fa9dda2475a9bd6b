use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use runbook_core::{
    Approval, ApprovalId, ApprovalRepository, ApprovalStatus, CoreError, Execution, ExecutionId,
    ExecutionLogEntry, ExecutionLogRepository, ExecutionRepository, ExecutionStatus, Workflow,
    WorkflowId, WorkflowRepository,
};

fn version_conflict(kind: &str, id: &str, stored: u64, incoming: u64) -> CoreError {
    warn!(kind, id, stored, incoming, "Rejected stale save");
    CoreError::VersionConflict(format!(
        "{} {} is at version {}, save carried {}",
        kind, id, stored, incoming
    ))
}

/// In-memory implementation of the WorkflowRepository
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,
}

impl InMemoryWorkflowRepository {
    /// Create a new in-memory workflow repository over shared storage
    pub fn new(workflows: Arc<RwLock<HashMap<String, Workflow>>>) -> Self {
        Self { workflows }
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, CoreError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id.0).cloned())
    }

    async fn save(&self, workflow: &Workflow) -> Result<u64, CoreError> {
        let mut workflows = self.workflows.write().await;

        if let Some(stored) = workflows.get(&workflow.id.0) {
            if stored.version != workflow.version {
                return Err(version_conflict(
                    "Workflow",
                    &workflow.id.0,
                    stored.version,
                    workflow.version,
                ));
            }
        }

        let mut updated = workflow.clone();
        updated.version += 1;
        let version = updated.version;
        workflows.insert(workflow.id.0.clone(), updated);

        debug!(workflow_id = %workflow.id.0, version, "Workflow saved");
        Ok(version)
    }

    async fn find_all(&self) -> Result<Vec<Workflow>, CoreError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.values().cloned().collect())
    }
}

/// In-memory implementation of the ExecutionRepository
pub struct InMemoryExecutionRepository {
    executions: Arc<RwLock<HashMap<String, Execution>>>,
}

impl InMemoryExecutionRepository {
    /// Create a new in-memory execution repository over shared storage
    pub fn new(executions: Arc<RwLock<HashMap<String, Execution>>>) -> Self {
        Self { executions }
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, CoreError> {
        let executions = self.executions.read().await;
        Ok(executions.get(&id.0).cloned())
    }

    async fn save(&self, execution: &Execution) -> Result<u64, CoreError> {
        let mut executions = self.executions.write().await;

        if let Some(stored) = executions.get(&execution.id.0) {
            if stored.version != execution.version {
                return Err(version_conflict(
                    "Execution",
                    &execution.id.0,
                    stored.version,
                    execution.version,
                ));
            }
        }

        let mut updated = execution.clone();
        updated.version += 1;
        let version = updated.version;
        executions.insert(execution.id.0.clone(), updated);

        debug!(execution_id = %execution.id.0, version, "Execution saved");
        Ok(version)
    }

    async fn list_executions(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<&ExecutionStatus>,
    ) -> Result<Vec<Execution>, CoreError> {
        let executions = self.executions.read().await;

        let result = executions
            .values()
            .filter(|execution| {
                // Apply workflow filter if present
                let workflow_match = match workflow_id {
                    Some(id) => &execution.workflow_id == id,
                    None => true,
                };

                // Apply status filter if present
                let status_match = match status {
                    Some(status) => execution.status == *status,
                    None => true,
                };

                workflow_match && status_match
            })
            .cloned()
            .collect();

        Ok(result)
    }
}

/// In-memory implementation of the ApprovalRepository
pub struct InMemoryApprovalRepository {
    approvals: Arc<RwLock<HashMap<String, Approval>>>,
}

impl InMemoryApprovalRepository {
    /// Create a new in-memory approval repository over shared storage
    pub fn new(approvals: Arc<RwLock<HashMap<String, Approval>>>) -> Self {
        Self { approvals }
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, CoreError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(&id.0).cloned())
    }

    async fn save(&self, approval: &Approval) -> Result<u64, CoreError> {
        let mut approvals = self.approvals.write().await;

        if let Some(stored) = approvals.get(&approval.id.0) {
            if stored.version != approval.version {
                return Err(version_conflict(
                    "Approval",
                    &approval.id.0,
                    stored.version,
                    approval.version,
                ));
            }
        }

        let mut updated = approval.clone();
        updated.version += 1;
        let version = updated.version;
        approvals.insert(approval.id.0.clone(), updated);

        debug!(approval_id = %approval.id.0, version, "Approval saved");
        Ok(version)
    }

    async fn find_pending(&self) -> Result<Vec<Approval>, CoreError> {
        let approvals = self.approvals.read().await;
        Ok(approvals
            .values()
            .filter(|approval| approval.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the append-only execution log
pub struct InMemoryExecutionLogRepository {
    entries: Arc<RwLock<Vec<ExecutionLogEntry>>>,
}

impl InMemoryExecutionLogRepository {
    /// Create a new in-memory execution log repository over shared storage
    pub fn new(entries: Arc<RwLock<Vec<ExecutionLogEntry>>>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl ExecutionLogRepository for InMemoryExecutionLogRepository {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        Ok(())
    }

    async fn find_entries(
        &self,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Vec<ExecutionLogEntry>, CoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| match workflow_id {
                Some(id) => &entry.workflow_id == id,
                None => true,
            })
            .cloned()
            .collect())
    }
}
