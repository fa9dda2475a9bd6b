//! Integration tests for the in-memory state store provider.
//!
//! The provider hands out repository sets that share one backing store, so
//! several engine instances wired from the same provider observe each
//! other's workflows, executions, and audit entries.

use std::sync::Arc;

use runbook_core::{
    AgentRegistry, Collaborators, CoreError, EngineConfig, ExecutionStatus, Payload,
    WorkflowEngine,
};
use runbook_state_inmemory::InMemoryStateStoreProvider;
use runbook_test_utils::data_generators::minimal_detect_definition;
use runbook_test_utils::{
    FailingAgent, FixedScheduler, RecordingCertificationService, RecordingDomainUpdater,
    RecordingEventHandler, RecordingNotifier, ScriptedAgent, StepBuilder,
    WorkflowDefinitionBuilder,
};

fn engine_over(provider: &InMemoryStateStoreProvider, agents: AgentRegistry) -> WorkflowEngine {
    let collaborators = Collaborators {
        certification: Arc::new(RecordingCertificationService::new()),
        notifier: Arc::new(RecordingNotifier::new()),
        domain_updater: Arc::new(RecordingDomainUpdater::new()),
        scheduler: Arc::new(FixedScheduler::new(None)),
        event_handler: Arc::new(RecordingEventHandler::new()),
    };

    WorkflowEngine::new(
        provider.create_repositories(),
        collaborators,
        Arc::new(agents),
        EngineConfig::default(),
    )
}

fn compliance_registry() -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents.register("lease_compliance", Arc::new(ScriptedAgent::new("lease_compliance")));
    agents
}

fn mixed_registry() -> AgentRegistry {
    let mut agents = compliance_registry();
    agents.register("offline", Arc::new(FailingAgent::new("offline", "scanner offline")));
    agents
}

#[tokio::test]
async fn test_engines_share_state_through_one_provider() {
    let provider = InMemoryStateStoreProvider::new();
    let writer = engine_over(&provider, compliance_registry());
    let reader = engine_over(&provider, AgentRegistry::new());

    let workflow = writer
        .create_workflow(minimal_detect_definition("lease_compliance"))
        .await
        .unwrap();
    let execution = writer
        .execute_workflow(&workflow.id, Payload::null())
        .await
        .unwrap();

    // A second engine over the same provider sees everything
    let fetched = reader.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(fetched.name, workflow.name);

    let stored = reader.get_execution(&execution.id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Completed);

    let history = reader.execution_history(None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].execution_id, execution.id);
}

#[tokio::test]
async fn test_execution_listing_filters_by_workflow_and_status() {
    let provider = InMemoryStateStoreProvider::new();
    let engine = engine_over(&provider, mixed_registry());

    let clean = engine
        .create_workflow(minimal_detect_definition("lease_compliance"))
        .await
        .unwrap();
    let flaky = engine
        .create_workflow(
            WorkflowDefinitionBuilder::new("Offline sweep")
                .step(
                    StepBuilder::detect("scan", "Scan registry", "offline", "registry_check")
                        .build(),
                )
                .build(),
        )
        .await
        .unwrap();

    engine.execute_workflow(&clean.id, Payload::null()).await.unwrap();
    engine.execute_workflow(&clean.id, Payload::null()).await.unwrap();
    assert!(engine.execute_workflow(&flaky.id, Payload::null()).await.is_err());

    let for_clean = engine
        .workflow_executions(Some(&clean.id), None)
        .await
        .unwrap();
    assert_eq!(for_clean.len(), 2);
    assert!(for_clean
        .iter()
        .all(|execution| execution.workflow_id == clean.id));

    let failed = engine
        .workflow_executions(None, Some(&ExecutionStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].workflow_id, flaky.id);

    let everything = engine.workflow_executions(None, None).await.unwrap();
    assert_eq!(everything.len(), 3);

    let none = engine
        .workflow_executions(Some(&clean.id), Some(&ExecutionStatus::Failed))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_audit_log_scopes_by_workflow() {
    let provider = InMemoryStateStoreProvider::new();
    let engine = engine_over(&provider, mixed_registry());

    let clean = engine
        .create_workflow(minimal_detect_definition("lease_compliance"))
        .await
        .unwrap();
    let flaky = engine
        .create_workflow(
            WorkflowDefinitionBuilder::new("Offline sweep")
                .step(
                    StepBuilder::detect("scan", "Scan registry", "offline", "registry_check")
                        .build(),
                )
                .build(),
        )
        .await
        .unwrap();

    engine.execute_workflow(&clean.id, Payload::null()).await.unwrap();
    assert!(engine.execute_workflow(&flaky.id, Payload::null()).await.is_err());

    let scoped = engine.execution_history(Some(&clean.id)).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].workflow_id, clean.id);
    assert_eq!(scoped[0].status, ExecutionStatus::Completed);

    let all = engine.execution_history(None).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_concurrent_executions_tolerate_the_stamp_race() {
    let provider = InMemoryStateStoreProvider::new();
    let engine = engine_over(&provider, compliance_registry());

    let workflow = engine
        .create_workflow(minimal_detect_definition("lease_compliance"))
        .await
        .unwrap();

    // Both executions stamp the workflow's last run time; losing that
    // version race must not fail either execution
    let (first, second) = tokio::join!(
        engine.execute_workflow(&workflow.id, Payload::null()),
        engine.execute_workflow(&workflow.id, Payload::null()),
    );
    assert_eq!(first.unwrap().status, ExecutionStatus::Completed);
    assert_eq!(second.unwrap().status, ExecutionStatus::Completed);

    let executions = engine
        .workflow_executions(Some(&workflow.id), None)
        .await
        .unwrap();
    assert_eq!(executions.len(), 2);

    let stamped = engine.get_workflow(&workflow.id).await.unwrap();
    assert!(stamped.last_executed_at.is_some());
}

#[tokio::test]
async fn test_stale_workflow_save_is_rejected() {
    let provider = InMemoryStateStoreProvider::new();
    let engine = engine_over(&provider, compliance_registry());

    let workflow = engine
        .create_workflow(minimal_detect_definition("lease_compliance"))
        .await
        .unwrap();

    // A writer holding an outdated version must not clobber the store
    let mut stale = engine.get_workflow(&workflow.id).await.unwrap();
    stale.version = 0;

    let repositories = provider.create_repositories();
    let result = repositories.workflows.save(&stale).await;
    match result {
        Err(CoreError::VersionConflict(message)) => {
            assert!(message.contains(&workflow.id.0));
        }
        other => panic!("Expected VersionConflict, got {:?}", other),
    }

    // The stored document is untouched
    let current = engine.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(current.version, workflow.version);
}
