//! Step dispatch for the six runbook step types
//!
//! The executor resolves a step into its collaborator effects and settles
//! the step record: completed with a typed result, or a recorded error for
//! the engine to judge against the retry policy. Approval-gated steps skip
//! the type dispatch entirely and resolve through the approval service.

use crate::{
    domain::collaborators::{
        CertificationService, DomainUpdater, IssueStatus, NewIssue, NotificationRequest, Notifier,
    },
    domain::context::{ActionResult, StepResult, UpdateResult, VerificationResult},
    domain::events::DomainStateSynchronized,
    domain::execution::{Execution, StepId},
    domain::flag::Severity,
    domain::rules::{self, actions, DecisionRule},
    domain::workflow::{Step, StepType},
    AgentRegistry, AnalysisInput, CoreError, Payload,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::approval_service::ApprovalService;
use super::engine::EngineConfig;

/// Executes a single workflow step against the platform collaborators
pub struct StepExecutor {
    /// Registry of analysis agents for detect steps
    agents: Arc<AgentRegistry>,

    /// Issue tracking, fixes and score recalculation
    certification: Arc<dyn CertificationService>,

    /// Notification delivery
    notifier: Arc<dyn Notifier>,

    /// Partial writes to compliance resource documents
    domain_updater: Arc<dyn DomainUpdater>,

    /// Human approval gates
    approvals: Arc<ApprovalService>,

    /// Engine configuration for notification defaults
    config: EngineConfig,
}

impl StepExecutor {
    /// Create a new step executor
    pub fn new(
        agents: Arc<AgentRegistry>,
        certification: Arc<dyn CertificationService>,
        notifier: Arc<dyn Notifier>,
        domain_updater: Arc<dyn DomainUpdater>,
        approvals: Arc<ApprovalService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            agents,
            certification,
            notifier,
            domain_updater,
            approvals,
            config,
        }
    }

    /// Run a step whose record is already marked running.
    ///
    /// On success the step is completed and its result recorded into the
    /// shared context. On error only the attempt's error is recorded; the
    /// step stays running so the engine can decide between retry and
    /// terminal failure.
    pub async fn run(
        &self,
        step: &Step,
        execution: &mut Execution,
    ) -> Result<StepResult, CoreError> {
        match self.dispatch(step, execution).await {
            Ok(result) => {
                execution.complete_step(&step.id, result.clone())?;
                Ok(result)
            }
            Err(error) => {
                execution.record_step_error(&step.id, &error)?;
                Err(error)
            }
        }
    }

    async fn dispatch(
        &self,
        step: &Step,
        execution: &mut Execution,
    ) -> Result<StepResult, CoreError> {
        if step.human_approval_required {
            let outcome = self.approvals.request_approval(step, execution).await?;
            return Ok(StepResult::Approval(outcome));
        }

        match step.step_type {
            StepType::Detect => self.run_detect(step, execution).await,
            StepType::Classify => self.run_classify(step, execution),
            StepType::Decide => self.run_decide(step, execution),
            StepType::Execute => self.run_execute(step, execution).await,
            StepType::Verify => self.run_verify(step, execution).await,
            StepType::Update => self.run_update(step, execution).await,
        }
    }

    /// Hand the execution context to the step's analysis agent.
    async fn run_detect(
        &self,
        step: &Step,
        execution: &Execution,
    ) -> Result<StepResult, CoreError> {
        let capability = step.agent.as_deref().ok_or_else(|| {
            CoreError::ValidationError(format!("Detect step {} names no agent", step.id.0))
        })?;
        let agent = self
            .agents
            .resolve(capability)
            .ok_or_else(|| CoreError::AgentNotFound(capability.to_string()))?;

        tracing::debug!(
            execution_id = %execution.id.0,
            step_id = %step.id.0,
            agent = capability,
            action = %step.action,
            "Dispatching detect step to agent"
        );

        let input = AnalysisInput {
            action: step.action.clone(),
            data: Payload::new(execution.context.snapshot()?),
            parameters: step.parameters.clone(),
        };

        let detection = agent.analyze(input).await?;
        Ok(StepResult::Detection(detection))
    }

    /// Grade a detection result and fold its flags into the execution.
    ///
    /// The source detection is the step named by the `sourceStep` parameter
    /// when given, otherwise the most recent detection in the context.
    fn run_classify(
        &self,
        step: &Step,
        execution: &mut Execution,
    ) -> Result<StepResult, CoreError> {
        let source = step
            .parameters
            .get("sourceStep")
            .and_then(|value| value.as_str());

        let detection = match source {
            Some(source_id) => execution
                .context
                .get(&StepId(source_id.to_string()))
                .and_then(StepResult::as_detection),
            None => execution.context.latest_detection(),
        }
        .ok_or_else(|| {
            CoreError::MissingInput(format!(
                "Classify step {} found no detection result",
                step.id.0
            ))
        })?
        .clone();

        let classification = rules::classify(&detection);
        execution.add_flags(detection.flags);

        Ok(StepResult::Classification(classification))
    }

    /// Choose a remediation for the latest classification.
    fn run_decide(&self, step: &Step, execution: &Execution) -> Result<StepResult, CoreError> {
        let classification = execution.context.latest_classification().ok_or_else(|| {
            CoreError::MissingInput(format!("Decide step {} found no classification", step.id.0))
        })?;

        let custom_rules = match step.parameters.get("rules") {
            Some(value) => serde_json::from_value::<Vec<DecisionRule>>(value.clone())?,
            None => Vec::new(),
        };

        let decision = rules::decide(classification, &custom_rules)?;
        Ok(StepResult::Decision(decision))
    }

    /// Carry out the decided action through the matching collaborator.
    async fn run_execute(
        &self,
        step: &Step,
        execution: &Execution,
    ) -> Result<StepResult, CoreError> {
        let decision = execution.context.latest_decision().ok_or_else(|| {
            CoreError::MissingInput(format!("Execute step {} found no decision", step.id.0))
        })?;

        tracing::debug!(
            execution_id = %execution.id.0,
            step_id = %step.id.0,
            action = %decision.action,
            "Carrying out decided action"
        );

        let result = match decision.action.as_str() {
            actions::AUTO_FIX => self.apply_auto_fix(execution).await?,
            actions::CREATE_TICKET => self.create_ticket(execution).await?,
            actions::BLOCK_ACCESS => self.block_access(execution).await?,
            actions::NOTIFY => self.send_notification(step, execution).await?,
            actions::LOG => self.log_only(execution),
            other => return Err(CoreError::UnknownAction(other.to_string())),
        };

        Ok(StepResult::Action(result))
    }

    /// Open an issue and attach an automated fix to it.
    async fn apply_auto_fix(&self, execution: &Execution) -> Result<ActionResult, CoreError> {
        let issue = self
            .certification
            .create_issue(&issue_request(execution))
            .await?;
        let fix = self
            .certification
            .create_auto_fix(&issue.id, "Automated remediation applied by workflow")
            .await?;

        let mut result = ActionResult::new(actions::AUTO_FIX, true);
        result.issue_id = Some(issue.id);
        result.fix_id = Some(fix.id);
        result.rollback_available = fix.rollback_available;
        result.rollback_actions = fix.rollback_actions;
        Ok(result)
    }

    /// Open an issue for manual handling.
    async fn create_ticket(&self, execution: &Execution) -> Result<ActionResult, CoreError> {
        let issue = self
            .certification
            .create_issue(&issue_request(execution))
            .await?;

        let mut result = ActionResult::new(actions::CREATE_TICKET, true);
        result.issue_id = Some(issue.id);
        Ok(result)
    }

    /// Revoke access on every affected resource.
    async fn block_access(&self, execution: &Execution) -> Result<ActionResult, CoreError> {
        let resources = execution.context.affected_resources.clone();
        let partial = Payload::new(json!({
            "accessBlocked": true,
            "accessBlockedAt": Utc::now().to_rfc3339(),
        }));

        for resource_id in &resources {
            self.domain_updater.update(resource_id, &partial).await?;
        }

        let mut result = ActionResult::new(actions::BLOCK_ACCESS, true);
        result.affected_resources = resources;
        Ok(result)
    }

    /// Notify stakeholders about the findings without remediating.
    async fn send_notification(
        &self,
        step: &Step,
        execution: &Execution,
    ) -> Result<ActionResult, CoreError> {
        let severity = execution
            .context
            .latest_classification()
            .map(|classification| classification.severity)
            .unwrap_or(Severity::Medium);

        let request = NotificationRequest {
            recipients: string_list(step.parameters.get("recipients"))
                .unwrap_or_else(|| self.config.default_notification_recipients.clone()),
            channels: string_list(step.parameters.get("channels"))
                .unwrap_or_else(|| self.config.default_notification_channels.clone()),
            priority: severity.to_string(),
            subject: format!("Compliance findings from workflow {}", execution.workflow_id.0),
            body: finding_summary(execution),
            metadata: Payload::new(json!({
                "executionId": execution.id.0,
                "flagCount": execution.flags.len(),
            })),
        };

        let notification = self.notifier.send(&request).await?;

        let mut result = ActionResult::new(actions::NOTIFY, true);
        result.notification_id = Some(notification.id);
        Ok(result)
    }

    /// Record the incident in the audit trail only.
    fn log_only(&self, execution: &Execution) -> ActionResult {
        tracing::info!(
            execution_id = %execution.id.0,
            flag_count = execution.flags.len(),
            "Incident recorded without remediation"
        );
        ActionResult::new(actions::LOG, true)
    }

    /// Re-check that the latest action had its intended effect.
    ///
    /// When the action opened an issue the check goes through the
    /// certification system; otherwise the action's own success report
    /// stands.
    async fn run_verify(
        &self,
        step: &Step,
        execution: &Execution,
    ) -> Result<StepResult, CoreError> {
        let action = execution.context.latest_action().ok_or_else(|| {
            CoreError::MissingInput(format!("Verify step {} found no action result", step.id.0))
        })?;

        let (verified, details) = match action.issue_id.as_deref() {
            Some(issue_id) => {
                let status = self.certification.issue_status(issue_id).await?;
                let verified = matches!(status, IssueStatus::Resolved | IssueStatus::Closed);
                (verified, format!("Issue {} status: {:?}", issue_id, status))
            }
            None => (
                action.success,
                format!(
                    "Action {} reported success={}",
                    action.action, action.success
                ),
            ),
        };

        Ok(StepResult::Verification(VerificationResult {
            verified,
            details,
            retry_required: !verified,
        }))
    }

    /// Push compliance state onto every affected resource.
    async fn run_update(
        &self,
        step: &Step,
        execution: &mut Execution,
    ) -> Result<StepResult, CoreError> {
        let resources = execution.context.affected_resources.clone();
        if resources.is_empty() {
            tracing::debug!(
                execution_id = %execution.id.0,
                step_id = %step.id.0,
                "Update step found no affected resources"
            );
            return Ok(StepResult::Update(UpdateResult::default()));
        }

        let partial = Payload::new(json!({
            "lastComplianceCheck": Utc::now().to_rfc3339(),
            "lastWorkflowExecution": execution.id.0,
        }));

        for resource_id in &resources {
            self.domain_updater.update(resource_id, &partial).await?;
        }

        let scores = self.certification.calculate_scores(&resources).await?;

        for resource_id in &resources {
            execution.record_event(Box::new(DomainStateSynchronized {
                execution_id: execution.id.clone(),
                resource_id: resource_id.clone(),
                timestamp: Utc::now(),
            }));
        }

        Ok(StepResult::Update(UpdateResult {
            updated_resources: resources,
            details: Payload::new(json!({ "scores": scores })),
        }))
    }
}

/// Issue request describing the execution's findings.
fn issue_request(execution: &Execution) -> NewIssue {
    let classification = execution.context.latest_classification();
    let severity = classification
        .map(|classification| classification.severity)
        .unwrap_or(Severity::Medium);
    let category = classification
        .map(|classification| classification.category.clone())
        .unwrap_or_else(|| "unknown".to_string());

    NewIssue {
        title: format!("Compliance incident: {}", category),
        description: finding_summary(execution),
        severity,
        affected_resources: execution.context.affected_resources.clone(),
        details: Payload::new(json!({
            "executionId": execution.id.0,
            "workflowId": execution.workflow_id.0,
        })),
    }
}

/// One line per flag, oldest first.
fn finding_summary(execution: &Execution) -> String {
    if execution.flags.is_empty() {
        return format!(
            "Workflow {} raised a compliance incident",
            execution.workflow_id.0
        );
    }
    execution
        .flags
        .iter()
        .map(|flag| format!("[{}] {}: {}", flag.severity, flag.flag_type, flag.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-empty list of strings from a JSON array parameter.
fn string_list(value: Option<&serde_json::Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let list: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_str())
        .map(str::to_string)
        .collect();
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}
