//! Repository traits for the Runbook core
//!
//! This module defines the persistence boundaries used by the engine.
//! External crates implement these traits to provide different storage
//! mechanisms.
//!
//! Saves follow an optimistic concurrency protocol: the incoming aggregate
//! must carry the currently stored `version`; the store increments it and
//! returns the new value, which the caller must adopt before saving again.
//! A mismatch fails with [`CoreError::VersionConflict`] and leaves the
//! stored document untouched.

use async_trait::async_trait;

use super::approval::Approval;
use super::execution::{Execution, ExecutionId, ExecutionLogEntry, ExecutionStatus, WorkflowId};
use super::workflow::Workflow;
use crate::CoreError;

/// Repository for workflow definitions
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Find a workflow by ID
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, CoreError>;

    /// Save a workflow, returning the new stored version
    async fn save(&self, workflow: &Workflow) -> Result<u64, CoreError>;

    /// Get all workflows
    async fn find_all(&self) -> Result<Vec<Workflow>, CoreError>;
}

/// Repository for executions
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Find an execution by ID
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, CoreError>;

    /// Save an execution, returning the new stored version
    async fn save(&self, execution: &Execution) -> Result<u64, CoreError>;

    /// List executions with optional filters
    async fn list_executions(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<&ExecutionStatus>,
    ) -> Result<Vec<Execution>, CoreError>;
}

/// Repository for approvals
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Find an approval by ID
    async fn find_by_id(
        &self,
        id: &crate::domain::approval::ApprovalId,
    ) -> Result<Option<Approval>, CoreError>;

    /// Save an approval, returning the new stored version
    async fn save(&self, approval: &Approval) -> Result<u64, CoreError>;

    /// Get all approvals still waiting for a response
    async fn find_pending(&self) -> Result<Vec<Approval>, CoreError>;
}

/// Append-only repository for the execution audit log
#[async_trait]
pub trait ExecutionLogRepository: Send + Sync {
    /// Append an audit entry
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), CoreError>;

    /// Get audit entries, optionally restricted to one workflow
    async fn find_entries(
        &self,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Vec<ExecutionLogEntry>, CoreError>;
}

/// Memory implementations for testing and local wiring
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::domain::approval::{ApprovalId, ApprovalStatus};
    use dashmap::mapref::entry::Entry;
    use dashmap::DashMap;
    use std::sync::RwLock;

    fn conflict(kind: &str, id: &str, stored: u64, incoming: u64) -> CoreError {
        CoreError::VersionConflict(format!(
            "{} {} is at version {}, save carried {}",
            kind, id, stored, incoming
        ))
    }

    /// In-memory workflow repository backed by a concurrent map
    pub struct MemoryWorkflowRepository {
        workflows: DashMap<String, Workflow>,
    }

    impl MemoryWorkflowRepository {
        /// Create a new memory workflow repository
        pub fn new() -> Self {
            Self {
                workflows: DashMap::with_capacity(16),
            }
        }
    }

    impl Default for MemoryWorkflowRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl WorkflowRepository for MemoryWorkflowRepository {
        async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, CoreError> {
            Ok(self.workflows.get(&id.0).map(|workflow| workflow.clone()))
        }

        async fn save(&self, workflow: &Workflow) -> Result<u64, CoreError> {
            match self.workflows.entry(workflow.id.0.clone()) {
                Entry::Occupied(mut entry) => {
                    let stored = entry.get().version;
                    if stored != workflow.version {
                        return Err(conflict("Workflow", &workflow.id.0, stored, workflow.version));
                    }
                    let mut updated = workflow.clone();
                    updated.version += 1;
                    let version = updated.version;
                    entry.insert(updated);
                    Ok(version)
                }
                Entry::Vacant(entry) => {
                    let mut created = workflow.clone();
                    created.version += 1;
                    let version = created.version;
                    entry.insert(created);
                    Ok(version)
                }
            }
        }

        async fn find_all(&self) -> Result<Vec<Workflow>, CoreError> {
            Ok(self
                .workflows
                .iter()
                .map(|entry| entry.value().clone())
                .collect())
        }
    }

    /// In-memory execution repository with a per-workflow index
    pub struct MemoryExecutionRepository {
        executions: DashMap<String, Execution>,
        workflow_index: DashMap<String, Vec<String>>,
    }

    impl MemoryExecutionRepository {
        /// Create a new memory execution repository
        pub fn new() -> Self {
            Self {
                executions: DashMap::with_capacity(64),
                workflow_index: DashMap::with_capacity(16),
            }
        }
    }

    impl Default for MemoryExecutionRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ExecutionRepository for MemoryExecutionRepository {
        async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, CoreError> {
            Ok(self.executions.get(&id.0).map(|execution| execution.clone()))
        }

        async fn save(&self, execution: &Execution) -> Result<u64, CoreError> {
            let version = match self.executions.entry(execution.id.0.clone()) {
                Entry::Occupied(mut entry) => {
                    let stored = entry.get().version;
                    if stored != execution.version {
                        return Err(conflict(
                            "Execution",
                            &execution.id.0,
                            stored,
                            execution.version,
                        ));
                    }
                    let mut updated = execution.clone();
                    updated.version += 1;
                    let version = updated.version;
                    entry.insert(updated);
                    version
                }
                Entry::Vacant(entry) => {
                    let mut created = execution.clone();
                    created.version += 1;
                    let version = created.version;
                    entry.insert(created);
                    version
                }
            };

            // Keep the workflow index current
            match self.workflow_index.entry(execution.workflow_id.0.clone()) {
                Entry::Occupied(mut entry) => {
                    if !entry.get().contains(&execution.id.0) {
                        entry.get_mut().push(execution.id.0.clone());
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(vec![execution.id.0.clone()]);
                }
            }

            Ok(version)
        }

        async fn list_executions(
            &self,
            workflow_id: Option<&WorkflowId>,
            status: Option<&ExecutionStatus>,
        ) -> Result<Vec<Execution>, CoreError> {
            let mut result = Vec::new();

            if let Some(workflow_id) = workflow_id {
                if let Some(execution_ids) = self.workflow_index.get(&workflow_id.0) {
                    for id in execution_ids.iter() {
                        if let Some(execution) = self.executions.get(id) {
                            if status.map_or(true, |status| execution.status == *status) {
                                result.push(execution.clone());
                            }
                        }
                    }
                }
            } else {
                for execution in self.executions.iter() {
                    if status.map_or(true, |status| execution.status == *status) {
                        result.push(execution.clone());
                    }
                }
            }

            Ok(result)
        }
    }

    /// In-memory approval repository
    pub struct MemoryApprovalRepository {
        approvals: DashMap<String, Approval>,
    }

    impl MemoryApprovalRepository {
        /// Create a new memory approval repository
        pub fn new() -> Self {
            Self {
                approvals: DashMap::with_capacity(16),
            }
        }
    }

    impl Default for MemoryApprovalRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ApprovalRepository for MemoryApprovalRepository {
        async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, CoreError> {
            Ok(self.approvals.get(&id.0).map(|approval| approval.clone()))
        }

        async fn save(&self, approval: &Approval) -> Result<u64, CoreError> {
            match self.approvals.entry(approval.id.0.clone()) {
                Entry::Occupied(mut entry) => {
                    let stored = entry.get().version;
                    if stored != approval.version {
                        return Err(conflict("Approval", &approval.id.0, stored, approval.version));
                    }
                    let mut updated = approval.clone();
                    updated.version += 1;
                    let version = updated.version;
                    entry.insert(updated);
                    Ok(version)
                }
                Entry::Vacant(entry) => {
                    let mut created = approval.clone();
                    created.version += 1;
                    let version = created.version;
                    entry.insert(created);
                    Ok(version)
                }
            }
        }

        async fn find_pending(&self) -> Result<Vec<Approval>, CoreError> {
            Ok(self
                .approvals
                .iter()
                .filter(|entry| entry.value().status == ApprovalStatus::Pending)
                .map(|entry| entry.value().clone())
                .collect())
        }
    }

    /// In-memory append-only execution log
    pub struct MemoryExecutionLogRepository {
        entries: RwLock<Vec<ExecutionLogEntry>>,
    }

    impl MemoryExecutionLogRepository {
        /// Create a new memory execution log repository
        pub fn new() -> Self {
            Self {
                entries: RwLock::new(Vec::new()),
            }
        }
    }

    impl Default for MemoryExecutionLogRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ExecutionLogRepository for MemoryExecutionLogRepository {
        async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), CoreError> {
            let mut entries = self.entries.write().map_err(|e| {
                CoreError::StateStoreError(format!("Failed to acquire write lock: {}", e))
            })?;

            entries.push(entry.clone());
            Ok(())
        }

        async fn find_entries(
            &self,
            workflow_id: Option<&WorkflowId>,
        ) -> Result<Vec<ExecutionLogEntry>, CoreError> {
            let entries = self.entries.read().map_err(|e| {
                CoreError::StateStoreError(format!("Failed to acquire read lock: {}", e))
            })?;

            Ok(entries
                .iter()
                .filter(|entry| {
                    workflow_id.map_or(true, |workflow_id| &entry.workflow_id == workflow_id)
                })
                .cloned()
                .collect())
        }
    }

}
