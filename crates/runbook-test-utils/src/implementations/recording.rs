//! Recording fakes for the collaborator interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use runbook_core::{
    AutoFix, CertificationService, CoreError, DomainEvent, DomainEventHandler, DomainUpdater,
    Issue, IssueStatus, NewIssue, Notification, NotificationRequest, Notifier, Payload, Scheduler,
    WorkflowId,
};

/// Notifier that records every request it accepts.
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
    failure: Mutex<Option<CoreError>>,
}

impl RecordingNotifier {
    /// Create a notifier that accepts everything.
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Requests accepted so far, in send order.
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }

    /// Number of requests accepted so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Make every subsequent send fail with the given error.
    pub fn fail_with(&self, error: CoreError) {
        *self.failure.lock() = Some(error);
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<Notification, CoreError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        self.sent.lock().push(request.clone());
        Ok(Notification {
            id: format!("notification-{}", uuid::Uuid::new_v4()),
            sent_at: Utc::now(),
        })
    }
}

/// Certification service that records issues, fixes, and rollbacks.
///
/// Issue and fix identifiers are sequential (`issue-1`, `fix-1`, ...) so
/// tests can assert on them without capturing return values.
pub struct RecordingCertificationService {
    issues: Mutex<Vec<NewIssue>>,
    fixes: Mutex<Vec<AutoFix>>,
    rollbacks: Mutex<Vec<String>>,
    scored: Mutex<Vec<String>>,
    rollback_available: Mutex<bool>,
}

impl RecordingCertificationService {
    /// Create a service whose fixes report rollback support.
    pub fn new() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            fixes: Mutex::new(Vec::new()),
            rollbacks: Mutex::new(Vec::new()),
            scored: Mutex::new(Vec::new()),
            rollback_available: Mutex::new(true),
        }
    }

    /// Issues opened so far.
    pub fn issues(&self) -> Vec<NewIssue> {
        self.issues.lock().clone()
    }

    /// Fixes applied so far.
    pub fn fixes(&self) -> Vec<AutoFix> {
        self.fixes.lock().clone()
    }

    /// Fix identifiers rolled back so far.
    pub fn rollbacks(&self) -> Vec<String> {
        self.rollbacks.lock().clone()
    }

    /// Resource identifiers that had scores recalculated.
    pub fn scored(&self) -> Vec<String> {
        self.scored.lock().clone()
    }

    /// Control whether subsequent fixes report rollback support.
    pub fn set_rollback_available(&self, available: bool) {
        *self.rollback_available.lock() = available;
    }
}

impl Default for RecordingCertificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificationService for RecordingCertificationService {
    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, CoreError> {
        let mut issues = self.issues.lock();
        issues.push(issue.clone());
        Ok(Issue {
            id: format!("issue-{}", issues.len()),
            title: issue.title.clone(),
            status: IssueStatus::Open,
            url: None,
        })
    }

    async fn create_auto_fix(
        &self,
        issue_id: &str,
        description: &str,
    ) -> Result<AutoFix, CoreError> {
        let rollback_available = *self.rollback_available.lock();
        let mut fixes = self.fixes.lock();

        let fix = AutoFix {
            id: format!("fix-{}", fixes.len() + 1),
            issue_id: Some(issue_id.to_string()),
            description: description.to_string(),
            rollback_available,
            rollback_actions: if rollback_available {
                vec!["restore previous state".to_string()]
            } else {
                Vec::new()
            },
        };
        fixes.push(fix.clone());
        Ok(fix)
    }

    async fn calculate_scores(
        &self,
        resource_ids: &[String],
    ) -> Result<HashMap<String, f64>, CoreError> {
        self.scored.lock().extend(resource_ids.iter().cloned());
        Ok(resource_ids.iter().map(|id| (id.clone(), 90.0)).collect())
    }

    async fn issue_status(&self, _issue_id: &str) -> Result<IssueStatus, CoreError> {
        Ok(IssueStatus::Open)
    }

    async fn rollback_auto_fix(&self, fix_id: &str) -> Result<(), CoreError> {
        self.rollbacks.lock().push(fix_id.to_string());
        Ok(())
    }
}

/// Domain updater that records every partial update.
pub struct RecordingDomainUpdater {
    updates: Mutex<Vec<(String, Payload)>>,
}

impl RecordingDomainUpdater {
    /// Create an updater that accepts everything.
    pub fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Updates applied so far, as (resource id, partial document) pairs.
    pub fn updates(&self) -> Vec<(String, Payload)> {
        self.updates.lock().clone()
    }
}

impl Default for RecordingDomainUpdater {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainUpdater for RecordingDomainUpdater {
    async fn update(&self, resource_id: &str, partial: &Payload) -> Result<(), CoreError> {
        self.updates
            .lock()
            .push((resource_id.to_string(), partial.clone()));
        Ok(())
    }
}

/// Scheduler that records registrations and answers with a fixed next run.
pub struct FixedScheduler {
    next: Option<DateTime<Utc>>,
    registrations: Mutex<Vec<(String, String)>>,
}

impl FixedScheduler {
    /// Create a scheduler that reports the given next run time.
    pub fn new(next: Option<DateTime<Utc>>) -> Self {
        Self {
            next,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Registrations received so far, as (workflow id, expression) pairs.
    pub fn registrations(&self) -> Vec<(String, String)> {
        self.registrations.lock().clone()
    }
}

#[async_trait]
impl Scheduler for FixedScheduler {
    async fn schedule(
        &self,
        workflow_id: &WorkflowId,
        schedule: &str,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.registrations
            .lock()
            .push((workflow_id.0.clone(), schedule.to_string()));
        Ok(self.next)
    }
}

/// Event handler that records the type of every event it receives.
pub struct RecordingEventHandler {
    seen: Mutex<Vec<String>>,
}

impl RecordingEventHandler {
    /// Create a handler with an empty record.
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Event types received so far, in publish order.
    pub fn event_types(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Default for RecordingEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainEventHandler for RecordingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.seen.lock().push(event.event_type().to_string());
        Ok(())
    }
}
