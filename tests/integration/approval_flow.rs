//! Integration tests for human approval gates driven through the engine.
//!
//! Gated workflows run on a detached task via `start_workflow`, so these
//! tests interleave with the suspended execution the way an embedding host
//! would: list the pending approval, respond to it, and watch the
//! execution reach its terminal status.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use runbook_core::{
    AgentRegistry, ApprovalDecision, ApprovalStatus, Collaborators, CoreError, DetectionResult,
    EngineConfig, ExecutionStatus, Flag, Payload, Severity, StepId, StepResult, StepRunStatus,
    WorkflowEngine,
};
use runbook_state_inmemory::InMemoryStateStoreProvider;
use runbook_test_utils::assertions::assert_step_status;
use runbook_test_utils::data_generators::gated_remediation_definition;
use runbook_test_utils::util::{wait_for_pending_approval, wait_for_terminal};
use runbook_test_utils::{
    FixedScheduler, RecordingCertificationService, RecordingDomainUpdater, RecordingEventHandler,
    RecordingNotifier, ScriptedAgent,
};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    engine: WorkflowEngine,
    certification: Arc<RecordingCertificationService>,
    notifier: Arc<RecordingNotifier>,
    updater: Arc<RecordingDomainUpdater>,
    events: Arc<RecordingEventHandler>,
}

fn harness() -> Harness {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(DetectionResult {
        flags: vec![Flag::new(
            "expired_certification",
            Severity::High,
            "grazing certification for lease-204 lapsed",
        )],
        affected_resources: vec!["lease-204".to_string()],
        ..DetectionResult::default()
    });
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", agent);

    let certification = Arc::new(RecordingCertificationService::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let updater = Arc::new(RecordingDomainUpdater::new());
    let events = Arc::new(RecordingEventHandler::new());

    let collaborators = Collaborators {
        certification: certification.clone(),
        notifier: notifier.clone(),
        domain_updater: updater.clone(),
        scheduler: Arc::new(FixedScheduler::new(None)),
        event_handler: events.clone(),
    };

    let engine = WorkflowEngine::new(
        InMemoryStateStoreProvider::new().create_repositories(),
        collaborators,
        Arc::new(agents),
        EngineConfig::default(),
    );

    Harness {
        engine,
        certification,
        notifier,
        updater,
        events,
    }
}

#[tokio::test]
async fn test_approved_gate_resumes_the_pipeline() {
    let harness = harness();
    let workflow = harness
        .engine
        .create_workflow(gated_remediation_definition("lease_compliance", 60_000))
        .await
        .unwrap();

    let execution_id = harness
        .engine
        .start_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    let approval = wait_for_pending_approval(&harness.engine, WAIT).await;
    assert_eq!(approval.execution_id, execution_id);
    assert_eq!(approval.step_id, StepId("gate".to_string()));
    assert_eq!(
        approval.description,
        "Approval required for step 'Approve remediation'"
    );

    // The approver sees the graded findings in the approval data
    assert_eq!(
        approval.data.lookup("classification.severity"),
        Some(&json!("high"))
    );

    let resolved = harness
        .engine
        .respond_to_approval(
            &approval.id,
            ApprovalDecision::Approved,
            "compliance-officer",
            Some("verified against the lease register".to_string()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);

    let execution = wait_for_terminal(&harness.engine, &execution_id, WAIT).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_step_status(&execution, "gate", StepRunStatus::Completed).unwrap();
    assert_step_status(&execution, "sync", StepRunStatus::Completed).unwrap();

    match execution.context.get(&StepId("gate".to_string())) {
        Some(StepResult::Approval(outcome)) => {
            assert!(outcome.approved);
            assert_eq!(outcome.approved_by, "compliance-officer");
            let response = outcome.response.as_ref().expect("response should be stored");
            assert_eq!(
                response.reason.as_deref(),
                Some("verified against the lease register")
            );
        }
        other => panic!("Expected an approval outcome, got {:?}", other),
    }

    // The sync step ran after the gate and touched the flagged lease
    assert_eq!(harness.updater.updates().len(), 1);

    // Approvers were notified with the graded severity when the gate opened
    let sent = harness.notifier.sent();
    assert!(sent.iter().any(|request| {
        request.subject == "Approval required: Approve remediation" && request.priority == "high"
    }));

    let events = harness.events.event_types();
    assert!(events.iter().any(|event| event == "approval.requested"));
    assert!(events.iter().any(|event| event == "approval.resolved"));
}

#[tokio::test]
async fn test_rejected_gate_fails_the_execution() {
    let harness = harness();
    let workflow = harness
        .engine
        .create_workflow(gated_remediation_definition("lease_compliance", 60_000))
        .await
        .unwrap();

    let execution_id = harness
        .engine
        .start_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    let approval = wait_for_pending_approval(&harness.engine, WAIT).await;
    harness
        .engine
        .respond_to_approval(
            &approval.id,
            ApprovalDecision::Rejected,
            "compliance-officer",
            Some("lease under active litigation".to_string()),
            None,
        )
        .await
        .unwrap();

    let execution = wait_for_terminal(&harness.engine, &execution_id, WAIT).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_step_status(&execution, "gate", StepRunStatus::Failed).unwrap();
    assert_step_status(&execution, "sync", StepRunStatus::Pending).unwrap();
    assert!(execution
        .error
        .as_ref()
        .is_some_and(|error| error.contains("lease under active litigation")));

    // Nothing was remediated or synced on the rejected path
    assert!(harness.certification.fixes().is_empty());
    assert!(harness.updater.updates().is_empty());
}

#[tokio::test]
async fn test_unanswered_gate_times_out() {
    let harness = harness();
    let workflow = harness
        .engine
        .create_workflow(gated_remediation_definition("lease_compliance", 300))
        .await
        .unwrap();

    let execution_id = harness
        .engine
        .start_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    let execution = wait_for_terminal(&harness.engine, &execution_id, WAIT).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution
        .error
        .as_ref()
        .is_some_and(|error| error.contains("Approval timed out")));

    // The expired approval is settled, not pending
    assert!(harness.engine.pending_approvals().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_response_is_rejected() {
    let harness = harness();
    let workflow = harness
        .engine
        .create_workflow(gated_remediation_definition("lease_compliance", 60_000))
        .await
        .unwrap();

    let execution_id = harness
        .engine
        .start_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    let approval = wait_for_pending_approval(&harness.engine, WAIT).await;
    harness
        .engine
        .respond_to_approval(&approval.id, ApprovalDecision::Approved, "first-officer", None, None)
        .await
        .unwrap();

    let second = harness
        .engine
        .respond_to_approval(&approval.id, ApprovalDecision::Rejected, "second-officer", None, None)
        .await;
    match second {
        Err(CoreError::AlreadyResponded(_)) => {}
        other => panic!("Expected AlreadyResponded, got {:?}", other),
    }

    // The first response stands
    let execution = wait_for_terminal(&harness.engine, &execution_id, WAIT).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
}
