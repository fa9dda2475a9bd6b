//!
//! Runbook Core - Workflow orchestration core for the compliance platform
//!
//! This crate defines the workflow engine, domain models, and interfaces
//! used to automate compliance runbooks. It is the foundation for the
//! other crates in the platform.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Domain layer - core business models, entities, and rules
pub mod domain;

/// Application services - core application logic
pub mod application;

/// Core types and traits
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;
pub use types::Payload;

// Re-export main API types for easy use
pub use domain::approval::{
    Approval, ApprovalDecision, ApprovalId, ApprovalResponse, ApprovalStatus,
};
pub use domain::collaborators::{
    AutoFix, CertificationService, DomainUpdater, Issue, IssueStatus, NewIssue, Notification,
    NotificationRequest, Notifier, Scheduler,
};
pub use domain::condition::{Condition, ConditionOperator};
pub use domain::context::{
    ActionResult, ApprovalOutcome, Classification, Decision, DetectionResult, ExecutionContext,
    StepResult, UpdateResult, VerificationResult,
};
pub use domain::events::DomainEvent;
pub use domain::execution::{
    Execution, ExecutionId, ExecutionLogEntry, ExecutionStatus, StepId, StepRun, StepRunStatus,
    WorkflowId,
};
pub use domain::flag::{Flag, Severity};
pub use domain::repository::{
    ApprovalRepository, ExecutionLogRepository, ExecutionRepository, WorkflowRepository,
};
pub use domain::rules::DecisionRule;
pub use domain::workflow::{
    FailureHandler, NotificationSpec, RetryPolicy, Step, StepType, SuccessHandler, Trigger,
    TriggerType, Workflow, WorkflowDefinition, WorkflowStatus,
};

// Application interfaces
pub use application::engine::{Collaborators, EngineConfig, Repositories, WorkflowEngine};
pub use application::execution_service::{DomainEventHandler, LoggingEventHandler};

/// Input handed to an agent for one detect step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    /// Action the step asks the agent to perform
    pub action: String,

    /// Snapshot of the execution context at dispatch time
    pub data: Payload,

    /// Step parameters, passed through unchanged
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Non-async base trait for analysis agents
/// This trait is object-safe and used as a marker trait
pub trait AgentBase: Send + Sync {
    /// Get the capability this agent provides
    fn capability(&self) -> &str;
}

/// An analysis agent that detect steps delegate to
#[async_trait]
pub trait Agent: AgentBase {
    /// Run the analysis described by the input
    async fn analyze(&self, input: AnalysisInput) -> Result<DetectionResult, CoreError>;
}

/// Registry of analysis agents, keyed by name
///
/// Agents are registered before the engine is constructed; lookups after
/// that point see a fixed set.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent under the given name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        self.agents.insert(name.into(), agent);
    }

    /// Look up an agent by name
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    /// Names of all registered agents
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }
}

/// Example agent that raises a flag when a numeric field crosses a threshold
pub struct ThresholdAgent {
    /// Dotted path of the field to inspect, resolved against the input data
    pub field: String,

    /// Value at or above which the flag is raised
    pub threshold: f64,

    /// Flag type to attach to findings
    pub flag_type: String,

    /// Severity of raised flags
    pub severity: Severity,
}

impl ThresholdAgent {
    /// Create a new ThresholdAgent
    pub fn new(
        field: impl Into<String>,
        threshold: f64,
        flag_type: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            field: field.into(),
            threshold,
            flag_type: flag_type.into(),
            severity,
        }
    }
}

impl AgentBase for ThresholdAgent {
    fn capability(&self) -> &str {
        "threshold"
    }
}

#[async_trait]
impl Agent for ThresholdAgent {
    async fn analyze(&self, input: AnalysisInput) -> Result<DetectionResult, CoreError> {
        let observed = input
            .data
            .lookup(&self.field)
            .and_then(|value| value.as_f64());

        let mut detection = DetectionResult::default();
        match observed {
            Some(value) if value >= self.threshold => {
                tracing::debug!(
                    field = %self.field,
                    value,
                    threshold = self.threshold,
                    "Threshold crossed"
                );
                detection.score = Some(value);
                detection.flags.push(Flag::new(
                    self.flag_type.clone(),
                    self.severity,
                    format!(
                        "{} is {} (threshold {})",
                        self.field, value, self.threshold
                    ),
                ));
            }
            Some(value) => {
                detection.score = Some(value);
            }
            None => {}
        }

        Ok(detection)
    }
}
