//! Workflow execution engine
//!
//! Drives one execution per async task through the workflow's steps in
//! definition order, checkpointing the execution document after every
//! state change and publishing buffered domain events to the injected
//! handler. The engine is the sole authority on retry versus terminal
//! failure; the step executor only reports what happened.

use crate::{
    domain::collaborators::{CertificationService, NotificationRequest, Notifier},
    domain::condition::Condition,
    domain::events::{DomainEvent, RollbackPerformed},
    domain::execution::{
        Execution, ExecutionId, ExecutionLogEntry, ExecutionStatus, StepId, WorkflowId,
    },
    domain::repository::{ExecutionLogRepository, ExecutionRepository, WorkflowRepository},
    domain::workflow::{NotificationSpec, Step, Workflow},
    CoreError, Payload,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::engine::EngineConfig;
use super::step_executor::StepExecutor;

/// Handler for domain events
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Event handler that writes every event to the tracing log
pub struct LoggingEventHandler;

#[async_trait]
impl DomainEventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        tracing::info!(
            event_type = event.event_type(),
            execution_id = %event.execution_id().0,
            timestamp = %event.timestamp(),
            "Domain event"
        );
        Ok(())
    }
}

/// Service that drives workflow executions to a terminal status
pub struct ExecutionService {
    /// Repository for workflows
    workflow_repo: Arc<dyn WorkflowRepository>,

    /// Repository for executions
    execution_repo: Arc<dyn ExecutionRepository>,

    /// Append-only execution audit log
    execution_log: Arc<dyn ExecutionLogRepository>,

    /// Executor for individual steps
    steps: Arc<StepExecutor>,

    /// Certification collaborator, used for opportunistic rollback
    certification: Arc<dyn CertificationService>,

    /// Notifier for step handler notifications
    notifier: Arc<dyn Notifier>,

    /// Event handler
    event_handler: Arc<dyn DomainEventHandler>,

    /// Engine configuration
    config: EngineConfig,
}

impl ExecutionService {
    /// Create a new execution service
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workflow_repo: Arc<dyn WorkflowRepository>,
        execution_repo: Arc<dyn ExecutionRepository>,
        execution_log: Arc<dyn ExecutionLogRepository>,
        steps: Arc<StepExecutor>,
        certification: Arc<dyn CertificationService>,
        notifier: Arc<dyn Notifier>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflow_repo,
            execution_repo,
            execution_log,
            steps,
            certification,
            notifier,
            event_handler,
            config,
        }
    }

    /// Execute a workflow and wait for its terminal status.
    ///
    /// Returns the completed execution; a terminal failure propagates as the
    /// failing step's error, with the failed execution document persisted.
    pub async fn execute_workflow(
        &self,
        workflow_id: &WorkflowId,
        trigger: Payload,
    ) -> Result<Execution, CoreError> {
        let workflow = self.load_active_workflow(workflow_id).await?;
        let execution = self.begin_execution(&workflow, trigger).await?;
        self.drive(workflow, execution).await
    }

    /// Start a workflow on a detached task and return the execution id.
    pub async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
        trigger: Payload,
    ) -> Result<ExecutionId, CoreError> {
        let workflow = self.load_active_workflow(workflow_id).await?;
        let execution = self.begin_execution(&workflow, trigger).await?;
        let execution_id = execution.id.clone();

        let service = self.clone();
        tokio::spawn(async move {
            let execution_id = execution.id.clone();
            if let Err(error) = service.drive(workflow, execution).await {
                tracing::error!(
                    execution_id = %execution_id.0,
                    error = %error,
                    "Detached workflow execution failed"
                );
            }
        });

        Ok(execution_id)
    }

    /// Get an execution by id.
    pub async fn get_execution(&self, execution_id: &ExecutionId) -> Result<Execution, CoreError> {
        self.execution_repo
            .find_by_id(execution_id)
            .await?
            .ok_or_else(|| CoreError::ExecutionNotFound(execution_id.0.clone()))
    }

    /// List executions, optionally filtered by workflow and status.
    pub async fn list_executions(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<&ExecutionStatus>,
    ) -> Result<Vec<Execution>, CoreError> {
        self.execution_repo
            .list_executions(workflow_id, status)
            .await
    }

    /// Read the execution audit log, optionally for one workflow.
    pub async fn execution_history(
        &self,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Vec<ExecutionLogEntry>, CoreError> {
        self.execution_log.find_entries(workflow_id).await
    }

    async fn load_active_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Workflow, CoreError> {
        let workflow = self
            .workflow_repo
            .find_by_id(workflow_id)
            .await?
            .ok_or_else(|| CoreError::WorkflowNotFound(workflow_id.0.clone()))?;

        if !workflow.is_active() {
            return Err(CoreError::WorkflowInactive(workflow_id.0.clone()));
        }

        Ok(workflow)
    }

    /// Persist a fresh execution and stamp the workflow's last run time.
    async fn begin_execution(
        &self,
        workflow: &Workflow,
        trigger: Payload,
    ) -> Result<Execution, CoreError> {
        let mut execution = Execution::new(workflow, trigger);
        self.checkpoint(&mut execution).await?;

        // The stamp is bookkeeping; losing a version race to a concurrent
        // execution of the same workflow is harmless.
        let mut stamped = workflow.clone();
        stamped.last_executed_at = Some(Utc::now());
        match self.workflow_repo.save(&stamped).await {
            Ok(_) => {}
            Err(CoreError::VersionConflict(message)) => {
                tracing::debug!(
                    workflow_id = %workflow.id.0,
                    %message,
                    "Skipped lastExecutedAt stamp"
                );
            }
            Err(error) => return Err(error),
        }

        tracing::info!(
            execution_id = %execution.id.0,
            workflow_id = %workflow.id.0,
            step_count = workflow.steps.len(),
            "Execution started"
        );

        Ok(execution)
    }

    /// Drive an execution through the workflow's steps in definition order.
    async fn drive(
        &self,
        workflow: Workflow,
        mut execution: Execution,
    ) -> Result<Execution, CoreError> {
        let mut pending_jump: Option<StepId> = None;

        for step in &workflow.steps {
            // A forward jump skips everything strictly before its target
            if let Some(target) = &pending_jump {
                if &step.id != target {
                    execution.skip_step(&step.id)?;
                    self.checkpoint(&mut execution).await?;
                    continue;
                }
                pending_jump = None;
            }

            // Unmet conditions skip the step without touching collaborators
            if !Condition::all_hold(&step.conditions, &execution.context) {
                tracing::debug!(
                    execution_id = %execution.id.0,
                    step_id = %step.id.0,
                    "Step conditions not met"
                );
                execution.skip_step(&step.id)?;
                self.checkpoint(&mut execution).await?;
                continue;
            }

            execution.begin_step(&step.id)?;
            self.checkpoint(&mut execution).await?;

            match self.run_step_with_retry(step, &mut execution).await {
                Ok(()) => {
                    self.checkpoint(&mut execution).await?;

                    if let Some(handler) = &step.on_success {
                        if let Some(spec) = &handler.notification {
                            self.send_handler_notification(spec, step, &execution, "succeeded")
                                .await;
                        }
                        if let Some(target) = &handler.next_step {
                            pending_jump = Some(target.clone());
                        }
                    }
                }
                Err(error) => {
                    execution.fail_step(&step.id, error.to_string())?;

                    if let Some(handler) = &step.on_failure {
                        if let Some(spec) = &handler.notification {
                            self.send_handler_notification(spec, step, &execution, "failed")
                                .await;
                        }
                    }

                    let recovery = step
                        .on_failure
                        .as_ref()
                        .and_then(|handler| handler.next_step.clone());

                    if let Some(target) = recovery {
                        tracing::warn!(
                            execution_id = %execution.id.0,
                            step_id = %step.id.0,
                            target = %target.0,
                            error = %error,
                            "Step failed; resuming from recovery step"
                        );
                        pending_jump = Some(target);
                        self.checkpoint(&mut execution).await?;
                        continue;
                    }

                    return self.fail_execution(execution, error).await;
                }
            }
        }

        execution.complete()?;
        self.checkpoint(&mut execution).await?;
        self.append_log(&execution).await?;

        tracing::info!(
            execution_id = %execution.id.0,
            duration_ms = execution.duration_ms().unwrap_or(0),
            flag_count = execution.flags.len(),
            "Execution completed"
        );

        Ok(execution)
    }

    /// Invoke a step under its retry policy.
    ///
    /// The policy counts total invocations, the first included; approval
    /// gated steps always get exactly one, and non-retryable errors end the
    /// attempts immediately.
    async fn run_step_with_retry(
        &self,
        step: &Step,
        execution: &mut Execution,
    ) -> Result<(), CoreError> {
        let total_attempts = if step.human_approval_required {
            1
        } else {
            step.retry_policy()
                .map(|policy| policy.total_attempts())
                .unwrap_or(1)
        };
        let delay_ms = step
            .retry_policy()
            .map(|policy| policy.delay_ms)
            .unwrap_or(0);

        let mut attempt = 1;
        loop {
            match self.steps.run(step, execution).await {
                Ok(_) => return Ok(()),
                Err(error) if attempt < total_attempts && error.is_retryable() => {
                    tracing::warn!(
                        execution_id = %execution.id.0,
                        step_id = %step.id.0,
                        attempt,
                        total_attempts,
                        error = %error,
                        "Step attempt failed; retrying"
                    );

                    if delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }

                    attempt = execution.mark_step_retry(&step.id)?;
                    self.checkpoint(execution).await?;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Settle a terminal failure: rollback, persist, log, propagate.
    async fn fail_execution(
        &self,
        mut execution: Execution,
        error: CoreError,
    ) -> Result<Execution, CoreError> {
        self.rollback_if_available(&mut execution).await;

        execution.fail(error.to_string())?;
        self.checkpoint(&mut execution).await?;
        self.append_log(&execution).await?;

        tracing::warn!(
            execution_id = %execution.id.0,
            error = %error,
            "Execution failed"
        );

        Err(error)
    }

    /// Undo the most recent reversible action.
    ///
    /// Rollback errors are logged; the original failure stays authoritative.
    async fn rollback_if_available(&self, execution: &mut Execution) {
        let action = match execution.context.latest_action() {
            Some(action) if action.rollback_available => action.clone(),
            _ => return,
        };
        let fix_id = match action.fix_id {
            Some(fix_id) => fix_id,
            None => return,
        };
        let step_id = match execution.context.latest_action.clone() {
            Some(step_id) => step_id,
            None => return,
        };

        match self.certification.rollback_auto_fix(&fix_id).await {
            Ok(()) => {
                execution.record_event(Box::new(RollbackPerformed {
                    execution_id: execution.id.clone(),
                    step_id,
                    actions: action.rollback_actions,
                    timestamp: Utc::now(),
                }));
                tracing::info!(
                    execution_id = %execution.id.0,
                    fix_id = %fix_id,
                    "Rolled back automated fix"
                );
            }
            Err(rollback_error) => {
                tracing::warn!(
                    execution_id = %execution.id.0,
                    fix_id = %fix_id,
                    error = %rollback_error,
                    "Rollback failed"
                );
            }
        }
    }

    /// Emit a configured step handler notification.
    ///
    /// Delivery failures are logged and never disturb the execution.
    async fn send_handler_notification(
        &self,
        spec: &NotificationSpec,
        step: &Step,
        execution: &Execution,
        outcome: &str,
    ) {
        let severity = execution
            .context
            .latest_classification()
            .map(|classification| classification.severity.to_string());

        let request = NotificationRequest {
            recipients: if spec.recipients.is_empty() {
                self.config.default_notification_recipients.clone()
            } else {
                spec.recipients.clone()
            },
            channels: if spec.channels.is_empty() {
                self.config.default_notification_channels.clone()
            } else {
                spec.channels.clone()
            },
            priority: spec
                .priority
                .clone()
                .or(severity)
                .unwrap_or_else(|| "medium".to_string()),
            subject: spec
                .subject
                .clone()
                .unwrap_or_else(|| format!("Step {} {}", step.name, outcome)),
            body: format!(
                "{}\n\nStep {} of workflow {} {} in execution {}",
                spec.message, step.id.0, execution.workflow_id.0, outcome, execution.id.0
            ),
            metadata: Payload::new(json!({
                "executionId": execution.id.0,
                "stepId": step.id.0,
                "outcome": outcome,
            })),
        };

        if let Err(error) = self.notifier.send(&request).await {
            tracing::warn!(
                execution_id = %execution.id.0,
                step_id = %step.id.0,
                error = %error,
                "Handler notification failed"
            );
        }
    }

    /// Persist the execution and publish its buffered events.
    async fn checkpoint(&self, execution: &mut Execution) -> Result<(), CoreError> {
        execution.version = self.execution_repo.save(execution).await?;
        self.handle_events(execution).await
    }

    /// Drain buffered domain events into the handler.
    async fn handle_events(&self, execution: &mut Execution) -> Result<(), CoreError> {
        let events = execution.take_events();
        for event in events {
            self.event_handler.handle_event(event).await?;
        }
        Ok(())
    }

    async fn append_log(&self, execution: &Execution) -> Result<(), CoreError> {
        self.execution_log
            .append(&ExecutionLogEntry::from_execution(execution))
            .await
    }
}

/// Clone implementation for ExecutionService
impl Clone for ExecutionService {
    fn clone(&self) -> Self {
        Self {
            workflow_repo: self.workflow_repo.clone(),
            execution_repo: self.execution_repo.clone(),
            execution_log: self.execution_log.clone(),
            steps: self.steps.clone(),
            certification: self.certification.clone(),
            notifier: self.notifier.clone(),
            event_handler: self.event_handler.clone(),
            config: self.config.clone(),
        }
    }
}
