//! Engine facade for the Runbook core
//!
//! Wires the application services together behind one API for embedding
//! hosts. Storage and platform integrations arrive as trait objects, so
//! the core never couples to a concrete backend.

use crate::{
    domain::approval::{Approval, ApprovalDecision, ApprovalId},
    domain::collaborators::{CertificationService, DomainUpdater, Notifier, Scheduler},
    domain::execution::{Execution, ExecutionId, ExecutionLogEntry, ExecutionStatus, WorkflowId},
    domain::repository::{
        ApprovalRepository, ExecutionLogRepository, ExecutionRepository, WorkflowRepository,
    },
    domain::workflow::{Workflow, WorkflowDefinition},
    AgentRegistry, CoreError, Payload,
};
use serde::Deserialize;
use std::sync::Arc;

use super::approval_service::ApprovalService;
use super::execution_service::{DomainEventHandler, ExecutionService};
use super::step_executor::StepExecutor;
use super::workflow_service::WorkflowService;

/// Engine defaults applied when a step or workflow leaves them out
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Deadline for approvals whose step sets no timeout
    pub default_approval_timeout_ms: u64,

    /// Approvers notified when a gated step names none
    pub default_approval_recipients: Vec<String>,

    /// Channels used when a notification names none
    pub default_notification_channels: Vec<String>,

    /// Recipients used when a notification names none
    pub default_notification_recipients: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_approval_timeout_ms: 3_600_000,
            default_approval_recipients: vec!["compliance-team".to_string()],
            default_notification_channels: vec!["email".to_string()],
            default_notification_recipients: vec!["compliance-team".to_string()],
        }
    }
}

/// Storage backends for the engine
#[derive(Clone)]
pub struct Repositories {
    /// Workflow storage
    pub workflows: Arc<dyn WorkflowRepository>,

    /// Execution storage
    pub executions: Arc<dyn ExecutionRepository>,

    /// Approval storage
    pub approvals: Arc<dyn ApprovalRepository>,

    /// Append-only audit log storage
    pub execution_log: Arc<dyn ExecutionLogRepository>,
}

/// Platform collaborators the engine calls out to
#[derive(Clone)]
pub struct Collaborators {
    /// Certification system for issues, fixes and compliance scores
    pub certification: Arc<dyn CertificationService>,

    /// Notification delivery
    pub notifier: Arc<dyn Notifier>,

    /// Writer for partial domain-state updates
    pub domain_updater: Arc<dyn DomainUpdater>,

    /// Schedule registration for recurring workflows
    pub scheduler: Arc<dyn Scheduler>,

    /// Sink for domain events
    pub event_handler: Arc<dyn DomainEventHandler>,
}

/// The main API provided by the Runbook core to embedding hosts
#[derive(Clone)]
pub struct WorkflowEngine {
    workflow_service: Arc<WorkflowService>,
    execution_service: Arc<ExecutionService>,
    approval_service: Arc<ApprovalService>,
}

impl WorkflowEngine {
    /// Wire an engine from storage, collaborators and analysis agents
    pub fn new(
        repositories: Repositories,
        collaborators: Collaborators,
        agents: Arc<AgentRegistry>,
        config: EngineConfig,
    ) -> Self {
        let approval_service = Arc::new(ApprovalService::new(
            repositories.approvals.clone(),
            collaborators.notifier.clone(),
            collaborators.event_handler.clone(),
            config.clone(),
        ));

        let step_executor = Arc::new(StepExecutor::new(
            agents,
            collaborators.certification.clone(),
            collaborators.notifier.clone(),
            collaborators.domain_updater.clone(),
            approval_service.clone(),
            config.clone(),
        ));

        let execution_service = Arc::new(ExecutionService::new(
            repositories.workflows.clone(),
            repositories.executions.clone(),
            repositories.execution_log.clone(),
            step_executor,
            collaborators.certification.clone(),
            collaborators.notifier.clone(),
            collaborators.event_handler.clone(),
            config.clone(),
        ));

        let workflow_service = Arc::new(WorkflowService::new(
            repositories.workflows.clone(),
            collaborators.scheduler.clone(),
        ));

        Self {
            workflow_service,
            execution_service,
            approval_service,
        }
    }

    /// Validate and store a workflow definition
    pub async fn create_workflow(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<Workflow, CoreError> {
        self.workflow_service.create_workflow(definition).await
    }

    /// Get a workflow by id
    pub async fn get_workflow(&self, workflow_id: &WorkflowId) -> Result<Workflow, CoreError> {
        self.workflow_service.get_workflow(workflow_id).await
    }

    /// List all stored workflows
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, CoreError> {
        self.workflow_service.list_workflows().await
    }

    /// Execute a workflow and wait for its terminal status
    pub async fn execute_workflow(
        &self,
        workflow_id: &WorkflowId,
        trigger: Payload,
    ) -> Result<Execution, CoreError> {
        self.execution_service
            .execute_workflow(workflow_id, trigger)
            .await
    }

    /// Start a workflow on a detached task and return the execution id
    pub async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
        trigger: Payload,
    ) -> Result<ExecutionId, CoreError> {
        self.execution_service
            .start_workflow(workflow_id, trigger)
            .await
    }

    /// Get an execution by id
    pub async fn get_execution(&self, execution_id: &ExecutionId) -> Result<Execution, CoreError> {
        self.execution_service.get_execution(execution_id).await
    }

    /// List executions, optionally filtered by workflow and status
    pub async fn workflow_executions(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<&ExecutionStatus>,
    ) -> Result<Vec<Execution>, CoreError> {
        self.execution_service
            .list_executions(workflow_id, status)
            .await
    }

    /// Read the execution audit log, optionally for one workflow
    pub async fn execution_history(
        &self,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Vec<ExecutionLogEntry>, CoreError> {
        self.execution_service.execution_history(workflow_id).await
    }

    /// Record a response to a pending approval
    pub async fn respond_to_approval(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        responded_by: &str,
        reason: Option<String>,
        modifications: Option<Payload>,
    ) -> Result<Approval, CoreError> {
        self.approval_service
            .respond(approval_id, decision, responded_by, reason, modifications)
            .await
    }

    /// List approvals still waiting for a response
    pub async fn pending_approvals(&self) -> Result<Vec<Approval>, CoreError> {
        self.approval_service.pending_approvals().await
    }
}
