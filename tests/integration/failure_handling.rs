//! Integration tests for retry, recovery jumps, and rollback behavior.

use std::sync::Arc;

use serde_json::json;

use runbook_core::{
    AgentRegistry, Collaborators, CoreError, DetectionResult, EngineConfig, ExecutionStatus, Flag,
    NotificationSpec, Payload, Severity, StepRunStatus, StepType, WorkflowEngine,
};
use runbook_state_inmemory::InMemoryStateStoreProvider;
use runbook_test_utils::assertions::assert_step_status;
use runbook_test_utils::{
    FailingAgent, FixedScheduler, RecordingCertificationService, RecordingDomainUpdater,
    RecordingEventHandler, RecordingNotifier, ScriptedAgent, StepBuilder,
    WorkflowDefinitionBuilder,
};

struct Harness {
    engine: WorkflowEngine,
    certification: Arc<RecordingCertificationService>,
    notifier: Arc<RecordingNotifier>,
    events: Arc<RecordingEventHandler>,
}

fn harness(agents: AgentRegistry) -> Harness {
    let certification = Arc::new(RecordingCertificationService::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let events = Arc::new(RecordingEventHandler::new());

    let collaborators = Collaborators {
        certification: certification.clone(),
        notifier: notifier.clone(),
        domain_updater: Arc::new(RecordingDomainUpdater::new()),
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
        events,
    }
}

/// Registry with a flagging compliance agent and a permanently offline one.
fn mixed_registry(offline_message: &str) -> (Arc<ScriptedAgent>, Arc<FailingAgent>, AgentRegistry) {
    let compliance = Arc::new(ScriptedAgent::new("lease_compliance"));
    compliance.set_fallback(DetectionResult {
        flags: vec![Flag::new(
            "expired_certification",
            Severity::High,
            "water certification for lease-204 lapsed",
        )],
        affected_resources: vec!["lease-204".to_string()],
        ..DetectionResult::default()
    });
    let offline = Arc::new(FailingAgent::new("offline", offline_message));

    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", compliance.clone());
    agents.register("offline", offline.clone());
    (compliance, offline, agents)
}

#[tokio::test]
async fn test_retry_exhaustion_fails_the_execution() {
    let agent = Arc::new(FailingAgent::new("offline", "certification registry unreachable"));
    let mut agents = AgentRegistry::new();
    agents.register("offline", agent.clone());
    let harness = harness(agents);

    let definition = WorkflowDefinitionBuilder::new("Flaky sweep")
        .step(
            StepBuilder::detect("scan", "Scan registry", "offline", "expired_certifications")
                .retry(3, 10)
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let result = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await;
    match result {
        Err(CoreError::StepExecutionError(message)) => {
            assert!(message.contains("certification registry unreachable"));
        }
        other => panic!("Expected StepExecutionError, got {:?}", other),
    }

    // The retry budget counts total invocations, the first one included
    assert_eq!(agent.call_count(), 3);

    let executions = harness
        .engine
        .workflow_executions(Some(&workflow.id), None)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert_eq!(executions[0].steps[0].attempts, 3);
    assert!(executions[0]
        .error
        .as_ref()
        .is_some_and(|error| error.contains("certification registry unreachable")));

    let history = harness
        .engine
        .execution_history(Some(&workflow.id))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_transient_failure_recovers_within_the_retry_budget() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.push_error(CoreError::StepExecutionError("registry timeout".to_string()));
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", agent.clone());
    let harness = harness(agents);

    let definition = WorkflowDefinitionBuilder::new("Retried sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .retry(3, 10)
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.steps[0].attempts, 2);
    assert_eq!(agent.call_count(), 2);
}

#[tokio::test]
async fn test_recovery_jump_resumes_from_the_target_step() {
    let (_compliance, offline, agents) = mixed_registry("scanner offline");
    let harness = harness(agents);

    let definition = WorkflowDefinitionBuilder::new("Recovering sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "offline", "expired_certifications")
                .on_failure_jump("report")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(StepBuilder::new("report", "Report outcome", StepType::Update, "sync_documents").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_step_status(&execution, "scan", StepRunStatus::Failed).unwrap();
    assert_step_status(&execution, "grade", StepRunStatus::Skipped).unwrap();
    assert_step_status(&execution, "report", StepRunStatus::Completed).unwrap();
    assert_eq!(offline.call_count(), 1);
}

#[tokio::test]
async fn test_terminal_failure_rolls_back_the_applied_fix() {
    let (_compliance, _offline, agents) = mixed_registry("barrier offline");
    let harness = harness(agents);

    // The pipeline applies an automated fix, then a later step fails with
    // no recovery path; the fix must be undone
    let definition = WorkflowDefinitionBuilder::new("Rolled-back sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(StepBuilder::new("choose", "Choose remediation", StepType::Decide, "choose_remediation").build())
        .step(StepBuilder::new("remediate", "Apply remediation", StepType::Execute, "autoFix").build())
        .step(StepBuilder::detect("barrier", "Recheck registry", "offline", "registry_check").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let result = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await;
    assert!(result.is_err());

    assert_eq!(harness.certification.fixes().len(), 1);
    assert_eq!(harness.certification.rollbacks(), vec!["fix-1"]);

    let executions = harness
        .engine
        .workflow_executions(Some(&workflow.id), None)
        .await
        .unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert_step_status(&executions[0], "remediate", StepRunStatus::Completed).unwrap();

    let events = harness.events.event_types();
    assert!(events.iter().any(|event| event == "rollback.performed"));
    assert!(events.iter().any(|event| event == "execution.failed"));
}

#[tokio::test]
async fn test_rollback_is_skipped_for_irreversible_fixes() {
    let (_compliance, _offline, agents) = mixed_registry("barrier offline");
    let harness = harness(agents);
    harness.certification.set_rollback_available(false);

    let definition = WorkflowDefinitionBuilder::new("Irreversible sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(StepBuilder::new("choose", "Choose remediation", StepType::Decide, "choose_remediation").build())
        .step(StepBuilder::new("remediate", "Apply remediation", StepType::Execute, "autoFix").build())
        .step(StepBuilder::detect("barrier", "Recheck registry", "offline", "registry_check").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let result = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await;
    assert!(result.is_err());

    assert_eq!(harness.certification.fixes().len(), 1);
    assert!(harness.certification.rollbacks().is_empty());

    let events = harness.events.event_types();
    assert!(!events.iter().any(|event| event == "rollback.performed"));
    assert!(events.iter().any(|event| event == "execution.failed"));
}

#[tokio::test]
async fn test_notifier_outage_does_not_fail_the_execution() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", agent);
    let harness = harness(agents);
    harness
        .notifier
        .fail_with(CoreError::NotificationError("smtp relay down".to_string()));

    let definition = WorkflowDefinitionBuilder::new("Notified sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .on_success_notify(NotificationSpec {
                    message: "sweep finished".to_string(),
                    ..NotificationSpec::default()
                })
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::new(json!({"region": "north"})))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_unknown_agent_is_not_retried() {
    let harness = harness(AgentRegistry::new());

    let definition = WorkflowDefinitionBuilder::new("Misconfigured sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "ghost", "expired_certifications")
                .retry(3, 10)
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let result = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await;
    match result {
        Err(CoreError::AgentNotFound(name)) => assert_eq!(name, "ghost"),
        other => panic!("Expected AgentNotFound, got {:?}", other),
    }

    // Configuration errors are deterministic; no retry attempts are burned
    let executions = harness
        .engine
        .workflow_executions(Some(&workflow.id), None)
        .await
        .unwrap();
    assert_eq!(executions[0].steps[0].attempts, 1);
}
