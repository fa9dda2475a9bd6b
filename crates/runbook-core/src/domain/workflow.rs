use crate::domain::condition::Condition;
use crate::domain::execution::{StepId, WorkflowId};
use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Workflow accepts trigger invocations
    Active,

    /// Workflow is temporarily suspended and rejects triggers
    Paused,

    /// Workflow ran to a natural end (one-shot workflows)
    Completed,

    /// Workflow was shut down after unrecoverable errors
    Failed,
}

/// How a workflow gets started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// Fired by the external scheduler on a cron-like schedule
    Scheduled,

    /// Fired when a named platform event arrives
    Event,

    /// Fired by an explicit API call
    Manual,

    /// Fired when a monitored metric crosses a threshold
    Threshold,
}

/// Trigger definition for a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Kind of trigger
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,

    /// Schedule expression, required for scheduled triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Event name, required for event triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Threshold configuration, required for threshold triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<serde_json::Value>,
}

impl Trigger {
    /// Trigger fired only by explicit API calls.
    pub fn manual() -> Self {
        Self {
            trigger_type: TriggerType::Manual,
            schedule: None,
            event: None,
            threshold: None,
        }
    }

    /// Trigger fired by the scheduler collaborator.
    pub fn scheduled(schedule: impl Into<String>) -> Self {
        Self {
            trigger_type: TriggerType::Scheduled,
            schedule: Some(schedule.into()),
            event: None,
            threshold: None,
        }
    }

    /// Trigger fired when the named platform event arrives.
    pub fn event(event: impl Into<String>) -> Self {
        Self {
            trigger_type: TriggerType::Event,
            schedule: None,
            event: Some(event.into()),
            threshold: None,
        }
    }
}

/// The kind of work a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Run an analysis agent over the execution context
    Detect,

    /// Grade the latest detection result into severity/category/priority
    Classify,

    /// Choose a remediation action for the latest classification
    Decide,

    /// Carry out the chosen action through a collaborator
    Execute,

    /// Check that a prior action had its intended effect
    Verify,

    /// Push resulting state back onto affected domain resources
    Update,
}

impl FromStr for StepType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detect" => Ok(StepType::Detect),
            "classify" => Ok(StepType::Classify),
            "decide" => Ok(StepType::Decide),
            "execute" => Ok(StepType::Execute),
            "verify" => Ok(StepType::Verify),
            "update" => Ok(StepType::Update),
            other => Err(CoreError::UnknownStepType(other.to_string())),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepType::Detect => "detect",
            StepType::Classify => "classify",
            StepType::Decide => "decide",
            StepType::Execute => "execute",
            StepType::Verify => "verify",
            StepType::Update => "update",
        };
        write!(f, "{}", s)
    }
}

/// Retry policy for a failing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of invocations, the first attempt included
    pub attempts: u32,

    /// Milliseconds to sleep between consecutive attempts
    #[serde(rename = "delay")]
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Total invocations the engine will make for the step.
    ///
    /// A policy of zero attempts still runs the step once.
    pub fn total_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Notification to emit when a step succeeds or fails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    /// Message body; step and execution details are appended by the engine
    pub message: String,

    /// Recipients, falling back to the engine defaults when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,

    /// Delivery channels, falling back to the engine defaults when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,

    /// Subject line override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Priority override; defaults to the classification severity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// What to do after a step completes successfully
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuccessHandler {
    /// Later step to jump to, skipping everything in between
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<StepId>,

    /// Notification to emit on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationSpec>,
}

/// What to do after a step fails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FailureHandler {
    /// Later step to resume from once retries are exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<StepId>,

    /// Notification to emit once the failure is final, retries included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationSpec>,

    /// Retry policy; absent means the step fails on its first error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

/// One unit of work in a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Identifier, unique within the owning workflow
    pub id: StepId,

    /// Human-readable name
    pub name: String,

    /// Kind of work this step performs
    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Analysis agent capability, required for detect steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Action identifier passed to the handler for this step type
    pub action: String,

    /// Handler-specific parameters
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,

    /// Gate conditions; all must hold or the step is skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Success handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success: Option<SuccessHandler>,

    /// Failure handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailureHandler>,

    /// Whether the step must be resolved by a human approval
    #[serde(default)]
    pub human_approval_required: bool,

    /// Approval deadline in milliseconds, defaulting to the engine config
    #[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Step {
    /// Create a step with no conditions, handlers, or approval gate.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_type: StepType,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: StepId(id.into()),
            name: name.into(),
            step_type,
            agent: None,
            action: action.into(),
            parameters: serde_json::Map::new(),
            conditions: Vec::new(),
            on_success: None,
            on_failure: None,
            human_approval_required: false,
            timeout_ms: None,
        }
    }

    /// Retry policy for this step, if one is configured.
    #[inline]
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.on_failure.as_ref().and_then(|handler| handler.retry.as_ref())
    }
}

/// Submitted workflow definition, not yet persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Human-readable name
    pub name: String,

    /// Description of what the workflow remediates
    pub description: String,

    /// How the workflow gets started
    pub trigger: Trigger,

    /// Ordered steps
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// Validate the definition.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Workflow name must not be empty".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(CoreError::ValidationError(
                "Workflow must have at least one step".to_string(),
            ));
        }

        // Step IDs must be unique within the workflow
        let mut step_ids = std::collections::HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(&step.id) {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate step ID: {}",
                    step.id.0
                )));
            }
        }

        // Detect steps run through the agent registry and must name a capability
        for step in &self.steps {
            if step.step_type == StepType::Detect && step.agent.is_none() {
                return Err(CoreError::ValidationError(format!(
                    "Detect step {} must name an agent",
                    step.id.0
                )));
            }
        }

        self.validate_jumps()?;
        self.validate_trigger()?;

        Ok(())
    }

    /// Jump targets must exist and must lie strictly after the jumping step.
    ///
    /// Backward jumps would introduce loops with no termination guard, so
    /// they are rejected here rather than at execution time.
    fn validate_jumps(&self) -> Result<(), CoreError> {
        for (index, step) in self.steps.iter().enumerate() {
            let success_target = step
                .on_success
                .as_ref()
                .and_then(|handler| handler.next_step.as_ref());
            let failure_target = step
                .on_failure
                .as_ref()
                .and_then(|handler| handler.next_step.as_ref());

            for target in success_target.into_iter().chain(failure_target) {
                match self.steps.iter().position(|candidate| &candidate.id == target) {
                    None => {
                        return Err(CoreError::ValidationError(format!(
                            "Step {} jumps to non-existent step: {}",
                            step.id.0, target.0
                        )));
                    }
                    Some(target_index) if target_index <= index => {
                        return Err(CoreError::ValidationError(format!(
                            "Step {} jumps backward to {}; only forward jumps are supported",
                            step.id.0, target.0
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    fn validate_trigger(&self) -> Result<(), CoreError> {
        match self.trigger.trigger_type {
            TriggerType::Scheduled if self.trigger.schedule.is_none() => {
                Err(CoreError::ValidationError(
                    "Scheduled trigger requires a schedule expression".to_string(),
                ))
            }
            TriggerType::Event if self.trigger.event.is_none() => Err(CoreError::ValidationError(
                "Event trigger requires an event name".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Aggregate: a named, reusable definition of an ordered sequence of steps.
///
/// Immutable after creation except for status and scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,

    /// Human-readable name
    pub name: String,

    /// Description of what the workflow remediates
    pub description: String,

    /// How the workflow gets started
    pub trigger: Trigger,

    /// Ordered steps
    pub steps: Vec<Step>,

    /// Lifecycle status
    pub status: WorkflowStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the workflow last began an execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,

    /// Next planned run, maintained for scheduled triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_execution_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version, incremented by the store on save
    #[serde(default)]
    pub version: u64,
}

impl Workflow {
    /// Build a persisted workflow from a submitted definition.
    ///
    /// Validates the definition, assigns a fresh id, marks the workflow
    /// active, and stamps creation time.
    pub fn from_definition(definition: WorkflowDefinition) -> Result<Self, CoreError> {
        definition.validate()?;
        Ok(Self {
            id: WorkflowId(Uuid::new_v4().to_string()),
            name: definition.name,
            description: definition.description,
            trigger: definition.trigger,
            steps: definition.steps,
            status: WorkflowStatus::Active,
            created_at: Utc::now(),
            last_executed_at: None,
            next_execution_at: None,
            version: 0,
        })
    }

    /// Position of a step within the definition order.
    #[inline]
    pub fn step_index(&self, step_id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| &step.id == step_id)
    }

    /// Look up a step by id.
    #[inline]
    pub fn step(&self, step_id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == step_id)
    }

    /// Whether the workflow currently accepts trigger invocations.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}
