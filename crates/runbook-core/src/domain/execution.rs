use crate::{
    domain::context::{ExecutionContext, StepResult},
    domain::events::{
        DomainEvent, ExecutionCancelled, ExecutionCompleted, ExecutionFailed, ExecutionStarted,
        StepCompleted, StepFailed, StepRetried, StepSkipped, StepStarted,
    },
    domain::flag::Flag,
    domain::workflow::Workflow,
    CoreError, Payload,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value object: Workflow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

/// Value object: Execution ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

/// Value object: Step ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Execution is currently running steps
    Running,

    /// All steps finished without a fatal failure
    Completed,

    /// A step failure was not recovered
    Failed,

    /// Execution was cancelled from outside
    Cancelled,
}

impl ExecutionStatus {
    /// Whether the execution has reached a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Status of a single step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRunStatus {
    /// Step has not been reached yet
    Pending,

    /// Step is currently being executed
    Running,

    /// Step finished and stored a result
    Completed,

    /// Step failed with a recorded error
    Failed,

    /// Step was bypassed by condition gating or a forward jump
    Skipped,
}

/// Per-step record inside an execution.
///
/// Every workflow step gets exactly one of these, created at execution
/// start, in workflow order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRun {
    /// Step this record tracks
    pub step_id: StepId,

    /// Current status
    pub status: StepRunStatus,

    /// When the first attempt began
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the step reached completed or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Result stored on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,

    /// Most recent error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of invocations made so far
    #[serde(default)]
    pub attempts: u32,
}

impl StepRun {
    fn pending(step_id: StepId) -> Self {
        Self {
            step_id,
            status: StepRunStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            attempts: 0,
        }
    }
}

/// Aggregate: one run of a workflow.
///
/// Mutated only by the engine task that owns it; concurrent writers are
/// fenced off by the version check in the execution repository.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Unique identifier
    pub id: ExecutionId,

    /// Workflow this execution runs
    pub workflow_id: WorkflowId,

    /// Current status
    pub status: ExecutionStatus,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// When the execution reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Step currently being executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepId>,

    /// One record per workflow step, in workflow order
    pub steps: Vec<StepRun>,

    /// Step results and trigger data shared across steps
    pub context: ExecutionContext,

    /// Findings accumulated from detection results
    pub flags: Vec<Flag>,

    /// Error that made the execution fail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optimistic concurrency version, incremented by the store on save
    #[serde(default)]
    pub version: u64,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Manually implement Clone for Execution
impl Clone for Execution {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            workflow_id: self.workflow_id.clone(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            current_step: self.current_step.clone(),
            steps: self.steps.clone(),
            context: self.context.clone(),
            flags: self.flags.clone(),
            error: self.error.clone(),
            version: self.version,
            events: Vec::new(), // We don't clone domain events
        }
    }
}

impl Execution {
    /// Create a new execution for a workflow.
    ///
    /// Every workflow step gets a pending record up front, so the step
    /// array always has one entry per step in workflow order.
    pub fn new(workflow: &Workflow, trigger: Payload) -> Self {
        let execution_id = ExecutionId(Uuid::new_v4().to_string());
        let now = Utc::now();

        let mut execution = Self {
            id: execution_id.clone(),
            workflow_id: workflow.id.clone(),
            status: ExecutionStatus::Running,
            started_at: now,
            completed_at: None,
            current_step: None,
            steps: workflow
                .steps
                .iter()
                .map(|step| StepRun::pending(step.id.clone()))
                .collect(),
            context: ExecutionContext::new(trigger),
            flags: Vec::new(),
            error: None,
            version: 0,
            events: Vec::with_capacity(8),
        };

        execution.record_event(Box::new(ExecutionStarted {
            execution_id,
            workflow_id: workflow.id.clone(),
            timestamp: now,
        }));

        execution
    }

    /// Look up the record for a step.
    #[inline]
    pub fn step_run(&self, step_id: &StepId) -> Option<&StepRun> {
        self.steps.iter().find(|run| &run.step_id == step_id)
    }

    fn step_run_mut(&mut self, step_id: &StepId) -> Result<&mut StepRun, CoreError> {
        self.steps
            .iter_mut()
            .find(|run| &run.step_id == step_id)
            .ok_or_else(|| {
                CoreError::ExecutionStateError(format!("No step record for: {}", step_id.0))
            })
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.status != ExecutionStatus::Running {
            return Err(CoreError::ExecutionStateError(format!(
                "Cannot mutate steps while execution is in state: {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// Mark a step as running and make it the current step.
    pub fn begin_step(&mut self, step_id: &StepId) -> Result<(), CoreError> {
        self.ensure_running()?;
        let run = self.step_run_mut(step_id)?;
        if run.status != StepRunStatus::Pending {
            return Err(CoreError::ExecutionStateError(format!(
                "Cannot begin step {} in state: {:?}",
                step_id.0, run.status
            )));
        }

        run.status = StepRunStatus::Running;
        run.started_at = Some(Utc::now());
        run.attempts = 1;
        self.current_step = Some(step_id.clone());

        self.record_event(Box::new(StepStarted {
            execution_id: self.id.clone(),
            step_id: step_id.clone(),
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Count another invocation of a running step, returning the new total.
    pub fn mark_step_retry(&mut self, step_id: &StepId) -> Result<u32, CoreError> {
        self.ensure_running()?;
        let run = self.step_run_mut(step_id)?;
        if run.status != StepRunStatus::Running {
            return Err(CoreError::ExecutionStateError(format!(
                "Cannot retry step {} in state: {:?}",
                step_id.0, run.status
            )));
        }

        run.attempts += 1;
        let attempt = run.attempts;

        self.record_event(Box::new(StepRetried {
            execution_id: self.id.clone(),
            step_id: step_id.clone(),
            attempt,
            timestamp: Utc::now(),
        }));

        Ok(attempt)
    }

    /// Complete a step and record its result into the shared context.
    pub fn complete_step(&mut self, step_id: &StepId, result: StepResult) -> Result<(), CoreError> {
        self.ensure_running()?;
        {
            let run = self.step_run_mut(step_id)?;
            if run.status != StepRunStatus::Running {
                return Err(CoreError::ExecutionStateError(format!(
                    "Cannot complete step {} in state: {:?}",
                    step_id.0, run.status
                )));
            }
        }

        self.context.record(step_id.clone(), result.clone())?;

        let run = self.step_run_mut(step_id)?;
        run.status = StepRunStatus::Completed;
        run.completed_at = Some(Utc::now());
        run.result = Some(result);
        run.error = None;

        self.record_event(Box::new(StepCompleted {
            execution_id: self.id.clone(),
            step_id: step_id.clone(),
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Record the error of a failed attempt without failing the step.
    ///
    /// Used between retries so the latest error is visible while the step
    /// stays running.
    pub fn record_step_error(&mut self, step_id: &StepId, error: &CoreError) -> Result<(), CoreError> {
        let run = self.step_run_mut(step_id)?;
        run.error = Some(error.to_string());
        Ok(())
    }

    /// Mark a step as terminally failed.
    pub fn fail_step(&mut self, step_id: &StepId, error: String) -> Result<(), CoreError> {
        self.ensure_running()?;
        let run = self.step_run_mut(step_id)?;
        if run.status != StepRunStatus::Running {
            return Err(CoreError::ExecutionStateError(format!(
                "Cannot fail step {} in state: {:?}",
                step_id.0, run.status
            )));
        }

        run.status = StepRunStatus::Failed;
        run.completed_at = Some(Utc::now());
        run.error = Some(error.clone());

        self.record_event(Box::new(StepFailed {
            execution_id: self.id.clone(),
            step_id: step_id.clone(),
            error,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Mark a pending step as skipped.
    ///
    /// Skipped steps never ran, so they keep no timestamps, result, or
    /// context entry.
    pub fn skip_step(&mut self, step_id: &StepId) -> Result<(), CoreError> {
        self.ensure_running()?;
        let run = self.step_run_mut(step_id)?;
        if run.status != StepRunStatus::Pending {
            return Err(CoreError::ExecutionStateError(format!(
                "Cannot skip step {} in state: {:?}",
                step_id.0, run.status
            )));
        }

        run.status = StepRunStatus::Skipped;

        self.record_event(Box::new(StepSkipped {
            execution_id: self.id.clone(),
            step_id: step_id.clone(),
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Append findings from a detection result.
    pub fn add_flags(&mut self, flags: Vec<Flag>) {
        self.flags.extend(flags);
    }

    /// Complete the execution successfully.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.current_step = None;

        self.record_event(Box::new(ExecutionCompleted {
            execution_id: self.id.clone(),
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Mark the execution as failed.
    pub fn fail(&mut self, error: String) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.clone());

        self.record_event(Box::new(ExecutionFailed {
            execution_id: self.id.clone(),
            error,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Cancel the execution from outside the engine loop.
    pub fn cancel(&mut self, reason: String) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = ExecutionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.error = Some(reason.clone());

        self.record_event(Box::new(ExecutionCancelled {
            execution_id: self.id.clone(),
            reason,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Wall-clock duration in milliseconds, once terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at.map(|completed| {
            (completed - self.started_at).num_milliseconds().max(0) as u64
        })
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}

/// Append-only audit record written when an execution terminates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    /// Execution the entry describes
    pub execution_id: ExecutionId,

    /// Workflow that was executed
    pub workflow_id: WorkflowId,

    /// Terminal status
    pub status: ExecutionStatus,

    /// Wall-clock duration in milliseconds
    pub duration: u64,

    /// Number of flags raised during the execution
    pub flags_raised: usize,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// Build the audit entry for a terminal execution.
    pub fn from_execution(execution: &Execution) -> Self {
        Self {
            execution_id: execution.id.clone(),
            workflow_id: execution.workflow_id.clone(),
            status: execution.status,
            duration: execution.duration_ms().unwrap_or(0),
            flags_raised: execution.flags.len(),
            timestamp: Utc::now(),
        }
    }
}
