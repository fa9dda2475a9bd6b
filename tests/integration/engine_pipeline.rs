//! Integration tests driving whole workflows through the engine facade.
//!
//! Each test wires a real engine over the in-memory state store and the
//! recording collaborator fakes, then asserts on the cross-module behavior
//! that unit tests inside the core crate cannot see: detection results
//! flowing into classification, decisions landing on the certification
//! system, and update steps syncing the lease documents.

use std::sync::Arc;

use serde_json::json;

use runbook_core::{
    AgentRegistry, Collaborators, Condition, ConditionOperator, DetectionResult, EngineConfig,
    ExecutionStatus, Flag, Payload, Severity, StepId, StepResult, StepRunStatus, StepType,
    WorkflowEngine,
};
use runbook_state_inmemory::InMemoryStateStoreProvider;
use runbook_test_utils::assertions::{assert_flag_raised, assert_step_status};
use runbook_test_utils::data_generators::remediation_pipeline_definition;
use runbook_test_utils::{
    FixedScheduler, RecordingCertificationService, RecordingDomainUpdater, RecordingEventHandler,
    RecordingNotifier, ScriptedAgent, StepBuilder, WorkflowDefinitionBuilder,
};

struct Harness {
    engine: WorkflowEngine,
    certification: Arc<RecordingCertificationService>,
    notifier: Arc<RecordingNotifier>,
    updater: Arc<RecordingDomainUpdater>,
    events: Arc<RecordingEventHandler>,
}

fn harness(agents: AgentRegistry) -> Harness {
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

fn registry_with(agent: &Arc<ScriptedAgent>) -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", agent.clone());
    agents
}

/// One high-severity finding touching a lease and one of its parcels.
fn lease_detection() -> DetectionResult {
    DetectionResult {
        flags: vec![Flag::new(
            "expired_certification",
            Severity::High,
            "water certification for lease-204 lapsed",
        )],
        affected_resources: vec!["lease-204".to_string(), "parcel-88".to_string()],
        ..DetectionResult::default()
    }
}

#[tokio::test]
async fn test_remediation_pipeline_runs_to_completion() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(lease_detection());
    let harness = harness(registry_with(&agent));

    let workflow = harness
        .engine
        .create_workflow(remediation_pipeline_definition("lease_compliance"))
        .await
        .unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::new(json!({"source": "manual_audit"})))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    for step_id in ["scan", "grade", "choose", "remediate", "sync"] {
        assert_step_status(&execution, step_id, StepRunStatus::Completed).unwrap();
    }
    assert_flag_raised(&execution, "expired_certification").unwrap();
    assert_eq!(agent.call_count(), 1);

    // One high flag grades High, which defaults to an automated fix
    let decision = execution
        .context
        .latest_decision()
        .expect("decision should be recorded");
    assert_eq!(decision.action, "autoFix");
    assert!(decision.auto_execute);

    let issues = harness.certification.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "Compliance incident: expired_certification");
    assert_eq!(issues[0].severity, Severity::High);
    assert_eq!(issues[0].affected_resources, vec!["lease-204", "parcel-88"]);

    let fixes = harness.certification.fixes();
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].description, "Automated remediation applied by workflow");

    // The update step syncs every affected resource and rescores it
    let updates = harness.updater.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].0, "lease-204");
    assert_eq!(updates[1].0, "parcel-88");
    assert!(updates[0].1.lookup("lastComplianceCheck").is_some());
    assert_eq!(harness.certification.scored(), vec!["lease-204", "parcel-88"]);

    let events = harness.events.event_types();
    assert_eq!(events.first().map(String::as_str), Some("execution.started"));
    assert_eq!(events.last().map(String::as_str), Some("execution.completed"));
    assert!(events.iter().any(|event| event == "domain_state.synchronized"));
}

#[tokio::test]
async fn test_detect_step_receives_trigger_and_parameters() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    let harness = harness(registry_with(&agent));

    let definition = WorkflowDefinitionBuilder::new("Targeted sweep")
        .description("Scan one region ahead of renewal")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .parameter("lookAheadDays", json!(30))
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    harness
        .engine
        .execute_workflow(&workflow.id, Payload::new(json!({"region": "north"})))
        .await
        .unwrap();

    let invocations = agent.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].action, "expired_certifications");
    assert_eq!(invocations[0].parameters["lookAheadDays"], json!(30));
    assert_eq!(
        invocations[0].data.lookup("trigger.region"),
        Some(&json!("north"))
    );
}

#[tokio::test]
async fn test_unmet_conditions_skip_the_gated_steps() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    let harness = harness(registry_with(&agent));

    // The scan only runs for full audits, and grading only runs when the
    // scan raised flags; a routine trigger satisfies neither
    let definition = WorkflowDefinitionBuilder::new("Conditional sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .condition(Condition::equals("trigger.mode", json!("full")))
                .build(),
        )
        .step(
            StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings")
                .condition(Condition {
                    field: "scan.flags".to_string(),
                    operator: ConditionOperator::Exists,
                    value: serde_json::Value::Null,
                })
                .build(),
        )
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::new(json!({"mode": "routine"})))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_step_status(&execution, "scan", StepRunStatus::Skipped).unwrap();
    assert_step_status(&execution, "grade", StepRunStatus::Skipped).unwrap();
    assert_eq!(agent.call_count(), 0);
    assert!(execution.context.get(&StepId("scan".to_string())).is_none());
}

#[tokio::test]
async fn test_custom_decision_rules_override_default_action() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(lease_detection());
    let harness = harness(registry_with(&agent));

    // High severity would default to autoFix; the tenant rule downgrades
    // remediation to a notification instead
    let rules = json!([
        {
            "conditions": {"severity": "high"},
            "action": "notify",
            "autoExecute": false
        }
    ]);
    let definition = WorkflowDefinitionBuilder::new("Notify-only sweep")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(
            StepBuilder::new("choose", "Choose remediation", StepType::Decide, "choose_remediation")
                .parameter("rules", rules)
                .build(),
        )
        .step(StepBuilder::new("act", "Carry out action", StepType::Execute, "carry_out").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let decision = execution
        .context
        .latest_decision()
        .expect("decision should be recorded");
    assert_eq!(decision.action, "notify");
    assert!(!decision.auto_execute);
    assert_eq!(decision.matched_rule, Some(0));

    // The execute step notified instead of opening an issue
    assert!(harness.certification.issues().is_empty());
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].subject,
        format!("Compliance findings from workflow {}", workflow.id.0)
    );
    assert_eq!(sent[0].priority, "high");
    assert!(sent[0].body.contains("[high] expired_certification"));
    assert_eq!(sent[0].recipients, vec!["compliance-team"]);
}

#[tokio::test]
async fn test_critical_security_finding_blocks_access() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(DetectionResult {
        flags: vec![Flag::new(
            "unauthorized_access",
            Severity::Critical,
            "lease-204 accessed by a revoked operator account",
        )],
        category: Some("security".to_string()),
        affected_resources: vec!["lease-204".to_string()],
        ..DetectionResult::default()
    });
    let harness = harness(registry_with(&agent));

    let definition = WorkflowDefinitionBuilder::new("Access review")
        .step(
            StepBuilder::detect("scan", "Scan access logs", "lease_compliance", "access_review")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(StepBuilder::new("choose", "Choose action", StepType::Decide, "choose_action").build())
        .step(StepBuilder::new("act", "Carry out action", StepType::Execute, "carry_out").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let decision = execution
        .context
        .latest_decision()
        .expect("decision should be recorded");
    assert_eq!(decision.action, "blockAccess");

    let updates = harness.updater.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "lease-204");
    assert_eq!(updates[0].1.lookup("accessBlocked"), Some(&json!(true)));
    assert!(updates[0].1.lookup("accessBlockedAt").is_some());
}

#[tokio::test]
async fn test_verify_step_reports_unresolved_issue() {
    let agent = Arc::new(ScriptedAgent::new("lease_compliance"));
    agent.set_fallback(lease_detection());
    let harness = harness(registry_with(&agent));

    // The recording certification service always reports issues as open,
    // so verification of the applied fix must come back negative
    let definition = WorkflowDefinitionBuilder::new("Verified remediation")
        .step(
            StepBuilder::detect("scan", "Scan leases", "lease_compliance", "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(StepBuilder::new("choose", "Choose remediation", StepType::Decide, "choose_remediation").build())
        .step(StepBuilder::new("remediate", "Apply remediation", StepType::Execute, "autoFix").build())
        .step(StepBuilder::new("confirm", "Confirm remediation", StepType::Verify, "confirm_remediation").build())
        .build();
    let workflow = harness.engine.create_workflow(definition).await.unwrap();

    let execution = harness
        .engine
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_step_status(&execution, "confirm", StepRunStatus::Completed).unwrap();

    match execution.context.get(&StepId("confirm".to_string())) {
        Some(StepResult::Verification(verification)) => {
            assert!(!verification.verified);
            assert!(verification.retry_required);
            assert!(verification.details.contains("issue-1"));
        }
        other => panic!("Expected a verification result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_workflow_crud_through_the_engine() {
    let harness = harness(AgentRegistry::new());

    let created = harness
        .engine
        .create_workflow(remediation_pipeline_definition("lease_compliance"))
        .await
        .unwrap();
    assert_eq!(created.name, "Certification remediation");
    assert_eq!(created.steps.len(), 5);

    let fetched = harness.engine.get_workflow(&created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.version, created.version);

    let listed = harness.engine.list_workflows().await.unwrap();
    assert_eq!(listed.len(), 1);

    // Definitions that fail validation are rejected before storage
    let invalid = WorkflowDefinitionBuilder::new("Empty workflow").build();
    let result = harness.engine.create_workflow(invalid).await;
    assert!(matches!(result, Err(runbook_core::CoreError::ValidationError(_))));
    assert_eq!(harness.engine.list_workflows().await.unwrap().len(), 1);
}
