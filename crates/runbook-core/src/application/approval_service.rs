//! Approval service for human-gated steps
//!
//! Suspends the owning execution task until an approver responds or the
//! deadline passes. Responses wake the waiting task directly through a
//! per-approval [`Notify`] handle instead of polling the store.

use crate::{
    domain::approval::{Approval, ApprovalDecision, ApprovalId, ApprovalStatus},
    domain::collaborators::{NotificationRequest, Notifier},
    domain::context::ApprovalOutcome,
    domain::execution::Execution,
    domain::repository::ApprovalRepository,
    domain::workflow::Step,
    CoreError, Payload,
};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time;

use super::engine::EngineConfig;
use super::execution_service::DomainEventHandler;

/// Service that requests and resolves human approvals
pub struct ApprovalService {
    /// Repository for approvals
    approval_repo: Arc<dyn ApprovalRepository>,

    /// Notifier used to reach approvers
    notifier: Arc<dyn Notifier>,

    /// Event handler
    event_handler: Arc<dyn DomainEventHandler>,

    /// Wake handles for suspended executions, keyed by approval id
    waiters: DashMap<String, Arc<Notify>>,

    /// Engine configuration for defaults
    config: EngineConfig,
}

impl ApprovalService {
    /// Create a new approval service
    pub fn new(
        approval_repo: Arc<dyn ApprovalRepository>,
        notifier: Arc<dyn Notifier>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            approval_repo,
            notifier,
            event_handler,
            waiters: DashMap::new(),
            config,
        }
    }

    /// Request an approval for the step and wait for its resolution
    ///
    /// Returns the outcome when approved; rejection and deadline expiry
    /// surface as [`CoreError::ApprovalRejected`] and
    /// [`CoreError::ApprovalTimeout`].
    pub async fn request_approval(
        &self,
        step: &Step,
        execution: &Execution,
    ) -> Result<ApprovalOutcome, CoreError> {
        let timeout_ms = step
            .timeout_ms
            .unwrap_or(self.config.default_approval_timeout_ms);
        let timeout = chrono::Duration::milliseconds(timeout_ms as i64);

        let mut approval = Approval::new(
            execution.id.clone(),
            step.id.clone(),
            execution.workflow_id.0.clone(),
            format!("Approval required for step '{}'", step.name),
            approval_data(step, execution),
            timeout,
        );
        approval.version = self.approval_repo.save(&approval).await?;
        self.handle_events(&mut approval).await?;

        tracing::info!(
            approval_id = %approval.id.0,
            execution_id = %execution.id.0,
            step_id = %step.id.0,
            timeout_ms,
            "Approval requested"
        );

        self.notify_approvers(step, execution, &approval).await;

        let waiter = Arc::new(Notify::new());
        self.waiters
            .insert(approval.id.0.clone(), waiter.clone());

        let result = self.wait_for_resolution(&approval, waiter).await;
        self.waiters.remove(&approval.id.0);
        result
    }

    /// Record a response to a pending approval and wake the waiting task
    pub async fn respond(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        responded_by: &str,
        reason: Option<String>,
        modifications: Option<Payload>,
    ) -> Result<Approval, CoreError> {
        let mut approval = self.load(approval_id).await?;
        approval.respond(decision, responded_by, reason.clone(), modifications.clone())?;

        match self.approval_repo.save(&approval).await {
            Ok(version) => approval.version = version,
            Err(CoreError::VersionConflict(_)) => {
                // The deadline path raced us; re-read and try once more.
                // If it settled the approval first, the aggregate guard
                // surfaces AlreadyResponded.
                approval = self.load(approval_id).await?;
                approval.respond(decision, responded_by, reason, modifications)?;
                approval.version = self.approval_repo.save(&approval).await?;
            }
            Err(error) => return Err(error),
        }

        self.handle_events(&mut approval).await?;

        tracing::info!(
            approval_id = %approval.id.0,
            status = ?approval.status,
            responded_by,
            "Approval response recorded"
        );

        if let Some(waiter) = self.waiters.get(&approval.id.0) {
            waiter.notify_one();
        }

        Ok(approval)
    }

    /// List approvals still waiting for a response
    pub async fn pending_approvals(&self) -> Result<Vec<Approval>, CoreError> {
        self.approval_repo.find_pending().await
    }

    /// Find an approval by id
    pub async fn get_approval(&self, approval_id: &ApprovalId) -> Result<Approval, CoreError> {
        self.load(approval_id).await
    }

    async fn wait_for_resolution(
        &self,
        approval: &Approval,
        waiter: Arc<Notify>,
    ) -> Result<ApprovalOutcome, CoreError> {
        // A response may have landed between save and waiter registration
        let stored = self.load(&approval.id).await?;
        if stored.status != ApprovalStatus::Pending {
            return self.settled_outcome(&stored);
        }

        let remaining = (approval.timeout_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let deadline = time::Instant::now() + remaining;

        loop {
            tokio::select! {
                _ = waiter.notified() => {
                    let stored = self.load(&approval.id).await?;
                    if stored.status == ApprovalStatus::Pending {
                        // Spurious wake, keep waiting
                        continue;
                    }
                    return self.settled_outcome(&stored);
                }
                _ = time::sleep_until(deadline) => {
                    return self.expire(&approval.id).await;
                }
            }
        }
    }

    /// Deadline path: transition to timeout unless a response won the race
    async fn expire(&self, approval_id: &ApprovalId) -> Result<ApprovalOutcome, CoreError> {
        let mut approval = self.load(approval_id).await?;
        if approval.status != ApprovalStatus::Pending {
            return self.settled_outcome(&approval);
        }

        approval.time_out()?;
        match self.approval_repo.save(&approval).await {
            Ok(version) => {
                approval.version = version;
                self.handle_events(&mut approval).await?;
                tracing::warn!(approval_id = %approval.id.0, "Approval timed out");
                Err(CoreError::ApprovalTimeout(approval.id.0.clone()))
            }
            Err(CoreError::VersionConflict(_)) => {
                // A response was stored after our read; honor it
                let stored = self.load(approval_id).await?;
                self.settled_outcome(&stored)
            }
            Err(error) => Err(error),
        }
    }

    fn settled_outcome(&self, approval: &Approval) -> Result<ApprovalOutcome, CoreError> {
        match approval.status {
            ApprovalStatus::Approved => Ok(ApprovalOutcome {
                approved: true,
                approved_by: approval.responded_by.clone().unwrap_or_default(),
                response: approval.response.clone(),
            }),
            ApprovalStatus::Rejected => {
                let reason = approval
                    .response
                    .as_ref()
                    .and_then(|response| response.reason.clone())
                    .unwrap_or_else(|| format!("Approval {} was rejected", approval.id.0));
                Err(CoreError::ApprovalRejected(reason))
            }
            _ => Err(CoreError::ApprovalTimeout(approval.id.0.clone())),
        }
    }

    async fn notify_approvers(&self, step: &Step, execution: &Execution, approval: &Approval) {
        let recipients = step
            .parameters
            .get("approvers")
            .and_then(|value| value.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| value.as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
            .filter(|recipients| !recipients.is_empty())
            .unwrap_or_else(|| self.config.default_approval_recipients.clone());

        if recipients.is_empty() {
            tracing::warn!(
                approval_id = %approval.id.0,
                "No approvers configured; approval can only resolve via API or timeout"
            );
            return;
        }

        let priority = execution
            .context
            .latest_classification()
            .map(|classification| classification.severity.to_string())
            .unwrap_or_else(|| "high".to_string());

        let request = NotificationRequest {
            recipients,
            channels: self.config.default_notification_channels.clone(),
            priority,
            subject: format!("Approval required: {}", step.name),
            body: approval.description.clone(),
            metadata: Payload::new(json!({
                "approvalId": approval.id.0,
                "executionId": execution.id.0,
                "stepId": step.id.0,
                "timeoutAt": approval.timeout_at.to_rfc3339(),
            })),
        };

        // Delivery failures leave the approval pending rather than failing it
        if let Err(error) = self.notifier.send(&request).await {
            tracing::warn!(
                approval_id = %approval.id.0,
                error = %error,
                "Failed to notify approvers"
            );
        }
    }

    async fn load(&self, approval_id: &ApprovalId) -> Result<Approval, CoreError> {
        self.approval_repo
            .find_by_id(approval_id)
            .await?
            .ok_or_else(|| CoreError::ApprovalNotFound(approval_id.0.clone()))
    }

    async fn handle_events(&self, approval: &mut Approval) -> Result<(), CoreError> {
        let events = approval.take_events();

        for event in events {
            self.event_handler.handle_event(event).await?;
        }

        Ok(())
    }
}

fn approval_data(step: &Step, execution: &Execution) -> Payload {
    let classification = execution
        .context
        .latest_classification()
        .map(|classification| {
            serde_json::to_value(classification).unwrap_or(serde_json::Value::Null)
        });
    let decision = execution
        .context
        .latest_decision()
        .map(|decision| serde_json::to_value(decision).unwrap_or(serde_json::Value::Null));
    let flags = serde_json::to_value(&execution.flags).unwrap_or(serde_json::Value::Null);

    Payload::new(json!({
        "action": step.action,
        "parameters": step.parameters,
        "classification": classification,
        "decision": decision,
        "flags": flags,
    }))
}
