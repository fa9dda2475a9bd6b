use thiserror::Error;

/// Core error type for the Runbook engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Workflow not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Workflow exists but is not in a runnable state
    #[error("Workflow is not active: {0}")]
    WorkflowInactive(String),

    /// Execution not found
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// Approval request not found
    #[error("Approval not found: {0}")]
    ApprovalNotFound(String),

    /// Agent not registered for the requested capability
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Step execution error
    #[error("Step execution error: {0}")]
    StepExecutionError(String),

    /// Step type is not one of the supported kinds
    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    /// Decision named an action the execute dispatch does not know
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A step found no upstream result to operate on
    #[error("Missing step input: {0}")]
    MissingInput(String),

    /// Approval deadline elapsed without a response
    #[error("Approval timed out: {0}")]
    ApprovalTimeout(String),

    /// Approval was rejected by a responder
    #[error("Approval rejected: {0}")]
    ApprovalRejected(String),

    /// Approval already left the pending state
    #[error("Approval already responded: {0}")]
    AlreadyResponded(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Aggregate state transition was not allowed
    #[error("Execution state error: {0}")]
    ExecutionStateError(String),

    /// Optimistic version check failed on save
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Notification delivery error
    #[error("Notification error: {0}")]
    NotificationError(String),

    /// Scheduler registration error
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    /// External collaborator failure
    #[error("Collaborator error: {0}")]
    CollaboratorError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether a failed step attempt may be re-invoked under a retry policy.
    ///
    /// Configuration mistakes, missing inputs, and approval outcomes are
    /// deterministic and never retried; transient collaborator and store
    /// failures are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::StepExecutionError(_)
                | CoreError::StateStoreError(_)
                | CoreError::NotificationError(_)
                | CoreError::CollaboratorError(_)
                | CoreError::Other(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
