//! Mock implementations of the state store traits.
//!
//! The in-memory repositories in `runbook-state-inmemory` cover happy-path
//! persistence; these mocks exist for failure injection, e.g. a state store
//! that errors on save or returns stale documents.

use async_trait::async_trait;
use mockall::mock;

use runbook_core::{
    Approval, ApprovalId, ApprovalRepository, CoreError, Execution, ExecutionId,
    ExecutionLogEntry, ExecutionLogRepository, ExecutionRepository, ExecutionStatus, Workflow,
    WorkflowId, WorkflowRepository,
};

mock! {
    pub WorkflowRepository {}

    #[async_trait]
    impl WorkflowRepository for WorkflowRepository {
        async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, CoreError>;
        async fn save(&self, workflow: &Workflow) -> Result<u64, CoreError>;
        async fn find_all(&self) -> Result<Vec<Workflow>, CoreError>;
    }
}

// `mockall` cannot express the borrowed `Option<&T>` filter arguments of an
// `#[async_trait]` method, so the mock takes owned filters and the trait impl
// below delegates with `.cloned()`.
mock! {
    pub ExecutionRepository {
        pub async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, CoreError>;
        pub async fn save(&self, execution: &Execution) -> Result<u64, CoreError>;
        pub async fn list_executions(
            &self,
            workflow_id: Option<WorkflowId>,
            status: Option<ExecutionStatus>,
        ) -> Result<Vec<Execution>, CoreError>;
    }
}

#[async_trait]
impl ExecutionRepository for MockExecutionRepository {
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, CoreError> {
        MockExecutionRepository::find_by_id(self, id).await
    }

    async fn save(&self, execution: &Execution) -> Result<u64, CoreError> {
        MockExecutionRepository::save(self, execution).await
    }

    async fn list_executions(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<&ExecutionStatus>,
    ) -> Result<Vec<Execution>, CoreError> {
        MockExecutionRepository::list_executions(self, workflow_id.cloned(), status.cloned()).await
    }
}

mock! {
    pub ApprovalRepository {}

    #[async_trait]
    impl ApprovalRepository for ApprovalRepository {
        async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, CoreError>;
        async fn save(&self, approval: &Approval) -> Result<u64, CoreError>;
        async fn find_pending(&self) -> Result<Vec<Approval>, CoreError>;
    }
}

// Same `Option<&T>` limitation as `MockExecutionRepository` above.
mock! {
    pub ExecutionLogRepository {
        pub async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), CoreError>;
        pub async fn find_entries(
            &self,
            workflow_id: Option<WorkflowId>,
        ) -> Result<Vec<ExecutionLogEntry>, CoreError>;
    }
}

#[async_trait]
impl ExecutionLogRepository for MockExecutionLogRepository {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), CoreError> {
        MockExecutionLogRepository::append(self, entry).await
    }

    async fn find_entries(
        &self,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Vec<ExecutionLogEntry>, CoreError> {
        MockExecutionLogRepository::find_entries(self, workflow_id.cloned()).await
    }
}

/// Creates a mock workflow repository over an empty store.
pub fn create_mock_workflow_repository() -> MockWorkflowRepository {
    let mut mock = MockWorkflowRepository::new();
    mock.expect_find_by_id().returning(|_| Ok(None));
    mock.expect_save().returning(|workflow| Ok(workflow.version + 1));
    mock.expect_find_all().returning(|| Ok(Vec::new()));
    mock
}

/// Creates a mock execution repository over an empty store.
pub fn create_mock_execution_repository() -> MockExecutionRepository {
    let mut mock = MockExecutionRepository::new();
    mock.expect_find_by_id().returning(|_| Ok(None));
    mock.expect_save().returning(|execution| Ok(execution.version + 1));
    mock.expect_list_executions().returning(|_, _| Ok(Vec::new()));
    mock
}

/// Creates a mock approval repository over an empty store.
pub fn create_mock_approval_repository() -> MockApprovalRepository {
    let mut mock = MockApprovalRepository::new();
    mock.expect_find_by_id().returning(|_| Ok(None));
    mock.expect_save().returning(|approval| Ok(approval.version + 1));
    mock.expect_find_pending().returning(|| Ok(Vec::new()));
    mock
}

/// Creates a mock execution log that accepts appends and reads back empty.
pub fn create_mock_execution_log_repository() -> MockExecutionLogRepository {
    let mut mock = MockExecutionLogRepository::new();
    mock.expect_append().returning(|_| Ok(()));
    mock.expect_find_entries().returning(|_| Ok(Vec::new()));
    mock
}
