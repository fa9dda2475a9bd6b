//! Mock implementations of the collaborator traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use std::collections::HashMap;

use runbook_core::{
    AutoFix, CertificationService, CoreError, DomainUpdater, Issue, IssueStatus, NewIssue,
    Notification, NotificationRequest, Notifier, Payload, Scheduler, WorkflowId,
};

mock! {
    pub CertificationService {}

    #[async_trait]
    impl CertificationService for CertificationService {
        async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, CoreError>;
        async fn create_auto_fix(
            &self,
            issue_id: &str,
            description: &str,
        ) -> Result<AutoFix, CoreError>;
        async fn calculate_scores(
            &self,
            resource_ids: &[String],
        ) -> Result<HashMap<String, f64>, CoreError>;
        async fn issue_status(&self, issue_id: &str) -> Result<IssueStatus, CoreError>;
        async fn rollback_auto_fix(&self, fix_id: &str) -> Result<(), CoreError>;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl Notifier for Notifier {
        async fn send(&self, request: &NotificationRequest) -> Result<Notification, CoreError>;
    }
}

mock! {
    pub DomainUpdater {}

    #[async_trait]
    impl DomainUpdater for DomainUpdater {
        async fn update(&self, resource_id: &str, partial: &Payload) -> Result<(), CoreError>;
    }
}

mock! {
    pub Scheduler {}

    #[async_trait]
    impl Scheduler for Scheduler {
        async fn schedule(
            &self,
            workflow_id: &WorkflowId,
            schedule: &str,
        ) -> Result<Option<DateTime<Utc>>, CoreError>;
    }
}

/// Creates a mock certification service with permissive default behavior:
/// issues open, fixes apply with rollback available, scores come back fixed.
pub fn create_mock_certification_service() -> MockCertificationService {
    let mut mock = MockCertificationService::new();

    mock.expect_create_issue().returning(|issue| {
        Ok(Issue {
            id: format!("issue-{}", uuid::Uuid::new_v4()),
            title: issue.title.clone(),
            status: IssueStatus::Open,
            url: None,
        })
    });

    mock.expect_create_auto_fix().returning(|issue_id, description| {
        Ok(AutoFix {
            id: format!("fix-{}", uuid::Uuid::new_v4()),
            issue_id: Some(issue_id.to_string()),
            description: description.to_string(),
            rollback_available: true,
            rollback_actions: vec!["restore previous state".to_string()],
        })
    });

    mock.expect_calculate_scores().returning(|resource_ids| {
        Ok(resource_ids.iter().map(|id| (id.clone(), 90.0)).collect())
    });

    mock.expect_issue_status().returning(|_| Ok(IssueStatus::Open));

    mock.expect_rollback_auto_fix().returning(|_| Ok(()));

    mock
}

/// Creates a mock notifier that accepts every request.
pub fn create_mock_notifier() -> MockNotifier {
    let mut mock = MockNotifier::new();

    mock.expect_send().returning(|_| {
        Ok(Notification {
            id: format!("notification-{}", uuid::Uuid::new_v4()),
            sent_at: Utc::now(),
        })
    });

    mock
}

/// Creates a mock domain updater that accepts every update.
pub fn create_mock_domain_updater() -> MockDomainUpdater {
    let mut mock = MockDomainUpdater::new();
    mock.expect_update().returning(|_, _| Ok(()));
    mock
}

/// Creates a mock scheduler that registers schedules without computing
/// a next run time.
pub fn create_mock_scheduler() -> MockScheduler {
    let mut mock = MockScheduler::new();
    mock.expect_schedule().returning(|_, _| Ok(None));
    mock
}
