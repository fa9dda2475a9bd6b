use crate::domain::context::ApprovalOutcome;
use crate::domain::events::{ApprovalRequested, ApprovalResolved, DomainEvent};
use crate::domain::execution::{ExecutionId, StepId};
use crate::{CoreError, Payload};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value object: Approval ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

/// Approval status
///
/// Transitions pending to one of the other three, and is terminal once it
/// leaves pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Waiting for a human response
    Pending,

    /// A responder approved the step
    Approved,

    /// A responder rejected the step
    Rejected,

    /// The deadline passed without a response
    Timeout,
}

/// Decision carried by an approval response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    /// Let the gated step proceed
    Approved,

    /// Block the gated step
    Rejected,
}

/// Response recorded when a human resolves an approval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    /// The decision taken
    pub decision: ApprovalDecision,

    /// Why the responder decided this way
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Adjusted parameters the gated step should use instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Payload>,
}

/// Aggregate: a human-in-the-loop gate with a deadline.
///
/// `timeout_at` is fixed at creation and never mutated afterwards.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    /// Unique identifier
    pub id: ApprovalId,

    /// Execution whose step is gated
    pub execution_id: ExecutionId,

    /// The gated step
    pub step_id: StepId,

    /// When the approval was requested
    pub requested_at: DateTime<Utc>,

    /// Workflow that requested the approval
    pub requested_by: String,

    /// What the approver is deciding on
    pub description: String,

    /// Context data shown to the approver
    pub data: Payload,

    /// Current status
    pub status: ApprovalStatus,

    /// When a response arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,

    /// Who responded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,

    /// The recorded response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ApprovalResponse>,

    /// Deadline, set at creation to request time plus the step timeout
    pub timeout_at: DateTime<Utc>,

    /// Optimistic concurrency version, incremented by the store on save
    #[serde(default)]
    pub version: u64,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Manually implement Clone for Approval
impl Clone for Approval {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            execution_id: self.execution_id.clone(),
            step_id: self.step_id.clone(),
            requested_at: self.requested_at,
            requested_by: self.requested_by.clone(),
            description: self.description.clone(),
            data: self.data.clone(),
            status: self.status,
            responded_at: self.responded_at,
            responded_by: self.responded_by.clone(),
            response: self.response.clone(),
            timeout_at: self.timeout_at,
            version: self.version,
            events: Vec::new(), // We don't clone domain events
        }
    }
}

impl Approval {
    /// Create a pending approval with its deadline fixed up front.
    pub fn new(
        execution_id: ExecutionId,
        step_id: StepId,
        requested_by: impl Into<String>,
        description: impl Into<String>,
        data: Payload,
        timeout: Duration,
    ) -> Self {
        let approval_id = ApprovalId(Uuid::new_v4().to_string());
        let now = Utc::now();

        let mut approval = Self {
            id: approval_id.clone(),
            execution_id: execution_id.clone(),
            step_id: step_id.clone(),
            requested_at: now,
            requested_by: requested_by.into(),
            description: description.into(),
            data,
            status: ApprovalStatus::Pending,
            responded_at: None,
            responded_by: None,
            response: None,
            timeout_at: now + timeout,
            version: 0,
            events: Vec::with_capacity(2),
        };

        approval.record_event(Box::new(ApprovalRequested {
            execution_id,
            step_id,
            approval_id,
            timestamp: now,
        }));

        approval
    }

    /// Whether the deadline has passed while still pending.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now > self.timeout_at
    }

    /// Record a human response.
    pub fn respond(
        &mut self,
        decision: ApprovalDecision,
        responded_by: impl Into<String>,
        reason: Option<String>,
        modifications: Option<Payload>,
    ) -> Result<(), CoreError> {
        self.ensure_pending()?;

        self.status = match decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
        };
        self.responded_at = Some(Utc::now());
        self.responded_by = Some(responded_by.into());
        self.response = Some(ApprovalResponse {
            decision,
            reason,
            modifications,
        });

        self.record_event(Box::new(ApprovalResolved {
            execution_id: self.execution_id.clone(),
            approval_id: self.id.clone(),
            status: self.status,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Mark the approval as timed out.
    pub fn time_out(&mut self) -> Result<(), CoreError> {
        self.ensure_pending()?;
        self.status = ApprovalStatus::Timeout;

        self.record_event(Box::new(ApprovalResolved {
            execution_id: self.execution_id.clone(),
            approval_id: self.id.clone(),
            status: self.status,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), CoreError> {
        if self.status != ApprovalStatus::Pending {
            return Err(CoreError::AlreadyResponded(format!(
                "Approval {} is already {:?}",
                self.id.0, self.status
            )));
        }
        Ok(())
    }

    /// Step result for an approved gate, if the approval was approved.
    pub fn outcome(&self) -> Option<ApprovalOutcome> {
        match self.status {
            ApprovalStatus::Approved => Some(ApprovalOutcome {
                approved: true,
                approved_by: self.responded_by.clone().unwrap_or_default(),
                response: self.response.clone(),
            }),
            _ => None,
        }
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
