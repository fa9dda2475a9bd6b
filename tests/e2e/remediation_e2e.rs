//! End-to-end test for the quarterly certification remediation flow.
//!
//! This test exercises a complete remediation pass the way the compliance
//! platform runs it:
//! 1. Deploys a scheduled workflow definition
//! 2. Triggers an execution from a quarterly audit
//! 3. Detects, grades, and remediates the expired certifications
//! 4. Syncs the affected lease documents and verifies the audit trail

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use runbook_core::{
    AgentRegistry, ApprovalDecision, Collaborators, DetectionResult, EngineConfig,
    ExecutionStatus, Flag, Payload, Severity, StepRunStatus, Trigger, WorkflowEngine,
};
use runbook_state_inmemory::InMemoryStateStoreProvider;
use runbook_test_utils::assertions::{assert_flag_raised, assert_step_status};
use runbook_test_utils::data_generators::{
    gated_remediation_definition, remediation_pipeline_definition,
};
use runbook_test_utils::util::{wait_for_pending_approval, wait_for_terminal};
use runbook_test_utils::{
    FixedScheduler, RecordingCertificationService, RecordingDomainUpdater, RecordingEventHandler,
    RecordingNotifier, ScriptedAgent,
};

struct Harness {
    engine: WorkflowEngine,
    certification: Arc<RecordingCertificationService>,
    notifier: Arc<RecordingNotifier>,
    updater: Arc<RecordingDomainUpdater>,
    scheduler: Arc<FixedScheduler>,
    events: Arc<RecordingEventHandler>,
}

fn harness(next_run: Option<chrono::DateTime<Utc>>) -> Harness {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(DetectionResult {
        flags: vec![
            Flag::new(
                "expired_certification",
                Severity::High,
                "water certification for lease-204 lapsed",
            ),
            Flag::new(
                "missing_documentation",
                Severity::Medium,
                "parcel-88 lacks a boundary survey",
            ),
        ],
        affected_resources: vec!["lease-204".to_string(), "parcel-88".to_string()],
        ..DetectionResult::default()
    });
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", agent);

    let certification = Arc::new(RecordingCertificationService::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let updater = Arc::new(RecordingDomainUpdater::new());
    let scheduler = Arc::new(FixedScheduler::new(next_run));
    let events = Arc::new(RecordingEventHandler::new());

    let collaborators = Collaborators {
        certification: certification.clone(),
        notifier: notifier.clone(),
        domain_updater: updater.clone(),
        scheduler: scheduler.clone(),
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
        scheduler,
        events,
    }
}

#[tokio::test]
async fn test_quarterly_certification_sweep_e2e() {
    // === SETUP: Create the engine and a quarterly schedule ===

    let next_run = Utc::now() + chrono::Duration::days(30);
    let harness = harness(Some(next_run));

    // === DEPLOY: Store the scheduled remediation workflow ===

    let mut definition = remediation_pipeline_definition("lease_compliance");
    definition.trigger = Trigger::scheduled("0 6 1 */3 *");

    let workflow = harness.engine.create_workflow(definition).await.unwrap();
    println!("Deployed workflow {}", workflow.id.0);

    assert_eq!(workflow.next_execution_at, Some(next_run));
    assert_eq!(
        harness.scheduler.registrations(),
        vec![(workflow.id.0.clone(), "0 6 1 */3 *".to_string())]
    );

    // === TRIGGER: Run the sweep as the quarterly audit would ===

    let execution = harness
        .engine
        .execute_workflow(
            &workflow.id,
            Payload::new(json!({"source": "quarterly_audit", "region": "north"})),
        )
        .await
        .unwrap();
    println!("Execution {} finished", execution.id.0);

    // === VERIFY: Every pipeline stage completed ===

    assert_eq!(execution.status, ExecutionStatus::Completed);
    for step_id in ["scan", "grade", "choose", "remediate", "sync"] {
        assert_step_status(&execution, step_id, StepRunStatus::Completed).unwrap();
    }
    assert_eq!(execution.flags.len(), 2);
    assert_flag_raised(&execution, "expired_certification").unwrap();
    assert_flag_raised(&execution, "missing_documentation").unwrap();

    let classification = execution
        .context
        .latest_classification()
        .expect("classification should be recorded");
    assert_eq!(classification.severity, Severity::High);
    assert_eq!(classification.category, "expired_certification");
    assert!(!classification.requires_approval);

    let decision = execution
        .context
        .latest_decision()
        .expect("decision should be recorded");
    assert_eq!(decision.action, "autoFix");
    println!(
        "Graded {} findings as {} and decided on {}",
        execution.flags.len(),
        classification.severity,
        decision.action
    );

    // === VERIFY: The remediation reached the certification system ===

    let issues = harness.certification.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "Compliance incident: expired_certification");
    assert!(issues[0].description.contains("[high] expired_certification"));
    assert!(issues[0].description.contains("[medium] missing_documentation"));

    let fixes = harness.certification.fixes();
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].issue_id.as_deref(), Some("issue-1"));

    // === VERIFY: Lease documents were synced and rescored ===

    let updates = harness.updater.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates
        .iter()
        .all(|(_, partial)| partial.lookup("lastComplianceCheck").is_some()));
    assert_eq!(harness.certification.scored(), vec!["lease-204", "parcel-88"]);

    // === VERIFY: The audit trail tells the whole story ===

    let events = harness.events.event_types();
    assert_eq!(events.first().map(String::as_str), Some("execution.started"));
    assert_eq!(events.last().map(String::as_str), Some("execution.completed"));
    assert_eq!(
        events.iter().filter(|event| event.as_str() == "step.started").count(),
        5
    );
    assert_eq!(
        events
            .iter()
            .filter(|event| event.as_str() == "domain_state.synchronized")
            .count(),
        2
    );

    let history = harness.engine.execution_history(None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Completed);

    let stamped = harness.engine.get_workflow(&workflow.id).await.unwrap();
    assert!(stamped.last_executed_at.is_some());
    println!("Audit trail verified: {} events recorded", events.len());
}

#[tokio::test]
async fn test_gated_remediation_rejection_e2e() {
    // === SETUP: Remediation requires an officer sign-off ===

    let harness = harness(None);
    let workflow = harness
        .engine
        .create_workflow(gated_remediation_definition("lease_compliance", 60_000))
        .await
        .unwrap();

    // === TRIGGER: Start detached and wait at the approval gate ===

    let execution_id = harness
        .engine
        .start_workflow(&workflow.id, Payload::new(json!({"source": "manual_review"})))
        .await
        .unwrap();

    let approval = wait_for_pending_approval(&harness.engine, Duration::from_secs(2)).await;
    println!("Approval {} pending for execution {}", approval.id.0, execution_id.0);

    // The officer sees both graded findings in the approval data
    let flags = approval
        .data
        .lookup("flags")
        .and_then(|value| value.as_array().cloned())
        .expect("approval data should carry the flags");
    assert_eq!(flags.len(), 2);

    // === RESPOND: The officer declines the automated fix ===

    harness
        .engine
        .respond_to_approval(
            &approval.id,
            ApprovalDecision::Rejected,
            "compliance-officer",
            Some("certification renewal already scheduled".to_string()),
            None,
        )
        .await
        .unwrap();

    // === VERIFY: The execution failed without side effects ===

    let execution = wait_for_terminal(&harness.engine, &execution_id, Duration::from_secs(2)).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_step_status(&execution, "gate", StepRunStatus::Failed).unwrap();
    assert!(execution
        .error
        .as_ref()
        .is_some_and(|error| error.contains("certification renewal already scheduled")));

    assert!(harness.certification.issues().is_empty());
    assert!(harness.certification.fixes().is_empty());
    assert!(harness.updater.updates().is_empty());
    assert!(harness.engine.pending_approvals().await.unwrap().is_empty());

    // The officer was asked before the decision was recorded
    assert!(harness
        .notifier
        .sent()
        .iter()
        .any(|request| request.subject == "Approval required: Approve remediation"));

    let history = harness.engine.execution_history(Some(&workflow.id)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
    println!("Rejection path verified for execution {}", execution_id.0);
}
