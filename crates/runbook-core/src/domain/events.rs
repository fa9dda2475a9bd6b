use crate::domain::approval::{ApprovalId, ApprovalStatus};
use crate::domain::execution::{ExecutionId, StepId, WorkflowId};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the execution ID this event is associated with
    fn execution_id(&self) -> &ExecutionId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Event: Execution started
#[derive(Debug)]
pub struct ExecutionStarted {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the workflow being executed
    pub workflow_id: WorkflowId,

    /// The timestamp when the execution started
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ExecutionStarted {
    fn event_type(&self) -> &'static str {
        "execution.started"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step started
#[derive(Debug)]
pub struct StepStarted {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step that started
    pub step_id: StepId,

    /// The timestamp when the step started
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepStarted {
    fn event_type(&self) -> &'static str {
        "step.started"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step completed
#[derive(Debug)]
pub struct StepCompleted {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step that completed
    pub step_id: StepId,

    /// The timestamp when the step completed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepCompleted {
    fn event_type(&self) -> &'static str {
        "step.completed"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step failed
#[derive(Debug)]
pub struct StepFailed {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step that failed
    pub step_id: StepId,

    /// The error that failed the step
    pub error: String,

    /// The timestamp when the step failed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepFailed {
    fn event_type(&self) -> &'static str {
        "step.failed"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step skipped
#[derive(Debug)]
pub struct StepSkipped {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step that was skipped
    pub step_id: StepId,

    /// The timestamp when the step was skipped
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepSkipped {
    fn event_type(&self) -> &'static str {
        "step.skipped"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step invoked again under its retry policy
#[derive(Debug)]
pub struct StepRetried {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step being retried
    pub step_id: StepId,

    /// The invocation count including this attempt
    pub attempt: u32,

    /// The timestamp when the retry began
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepRetried {
    fn event_type(&self) -> &'static str {
        "step.retried"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Execution completed successfully
#[derive(Debug)]
pub struct ExecutionCompleted {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The timestamp when the execution completed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ExecutionCompleted {
    fn event_type(&self) -> &'static str {
        "execution.completed"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Execution failed
#[derive(Debug)]
pub struct ExecutionFailed {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The error that failed the execution
    pub error: String,

    /// The timestamp when the execution failed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ExecutionFailed {
    fn event_type(&self) -> &'static str {
        "execution.failed"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Execution cancelled from outside
#[derive(Debug)]
pub struct ExecutionCancelled {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// Why the execution was cancelled
    pub reason: String,

    /// The timestamp when the execution was cancelled
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ExecutionCancelled {
    fn event_type(&self) -> &'static str {
        "execution.cancelled"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Human approval requested
#[derive(Debug)]
pub struct ApprovalRequested {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the gated step
    pub step_id: StepId,

    /// The identifier of the approval document
    pub approval_id: ApprovalId,

    /// The timestamp when the approval was requested
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ApprovalRequested {
    fn event_type(&self) -> &'static str {
        "approval.requested"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Approval left the pending status
#[derive(Debug)]
pub struct ApprovalResolved {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the approval document
    pub approval_id: ApprovalId,

    /// The terminal status the approval reached
    pub status: ApprovalStatus,

    /// The timestamp when the approval was resolved
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ApprovalResolved {
    fn event_type(&self) -> &'static str {
        "approval.resolved"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: A reversible action was rolled back
#[derive(Debug)]
pub struct RollbackPerformed {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The identifier of the step whose action was rolled back
    pub step_id: StepId,

    /// The rollback actions that were applied
    pub actions: Vec<String>,

    /// The timestamp when the rollback finished
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for RollbackPerformed {
    fn event_type(&self) -> &'static str {
        "rollback.performed"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Domain state pushed to an affected resource
#[derive(Debug)]
pub struct DomainStateSynchronized {
    /// The unique identifier of the execution
    pub execution_id: ExecutionId,

    /// The resource whose state was synchronized
    pub resource_id: String,

    /// The timestamp when the synchronization finished
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for DomainStateSynchronized {
    fn event_type(&self) -> &'static str {
        "domain_state.synchronized"
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
