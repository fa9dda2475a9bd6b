//! Canned workflow definitions used across the test suites.

use serde_json::json;

use crate::builders::{StepBuilder, WorkflowDefinitionBuilder};
use runbook_core::{StepType, WorkflowDefinition};

/// Minimal valid definition: one detect step bound to the given agent.
pub fn minimal_detect_definition(agent: &str) -> WorkflowDefinition {
    WorkflowDefinitionBuilder::new("Minimal sweep")
        .description("Single detection pass")
        .step(StepBuilder::detect("scan", "Scan leases", agent, "expired_certifications").build())
        .build()
}

/// Full remediation pipeline: detect, classify, decide, execute, update.
pub fn remediation_pipeline_definition(agent: &str) -> WorkflowDefinition {
    WorkflowDefinitionBuilder::new("Certification remediation")
        .description("Detect expired certifications and remediate automatically")
        .step(
            StepBuilder::detect("scan", "Scan certifications", agent, "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(
            StepBuilder::new("choose", "Choose remediation", StepType::Decide, "choose_remediation")
                .build(),
        )
        .step(StepBuilder::new("remediate", "Apply remediation", StepType::Execute, "autoFix").build())
        .step(StepBuilder::new("sync", "Sync lease documents", StepType::Update, "sync_documents").build())
        .build()
}

/// Pipeline whose execute step is gated behind a human approval.
pub fn gated_remediation_definition(agent: &str, timeout_ms: u64) -> WorkflowDefinition {
    WorkflowDefinitionBuilder::new("Gated remediation")
        .description("Remediation requiring an officer sign-off")
        .step(
            StepBuilder::detect("scan", "Scan certifications", agent, "expired_certifications")
                .build(),
        )
        .step(StepBuilder::new("grade", "Grade findings", StepType::Classify, "grade_findings").build())
        .step(
            StepBuilder::new("gate", "Approve remediation", StepType::Execute, "autoFix")
                .approval(timeout_ms)
                .build(),
        )
        .step(StepBuilder::new("sync", "Sync lease documents", StepType::Update, "sync_documents").build())
        .build()
}

/// Raw definition document in the shape the platform stores and exchanges.
///
/// Kept as JSON rather than built types so parse tests exercise the full
/// deserialization path, renamed fields included.
pub fn definition_document(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "description": "Quarterly certification sweep",
        "trigger": {
            "type": "scheduled",
            "schedule": "0 2 1 */3 *"
        },
        "steps": [
            {
                "id": "scan",
                "name": "Scan certifications",
                "type": "detect",
                "agent": "lease_compliance",
                "action": "expired_certifications",
                "parameters": {"lookAheadDays": 30}
            },
            {
                "id": "grade",
                "name": "Grade findings",
                "type": "classify",
                "action": "grade_findings",
                "conditions": [
                    {"field": "scan.flags", "operator": "exists"}
                ]
            },
            {
                "id": "remediate",
                "name": "Apply remediation",
                "type": "execute",
                "action": "autoFix",
                "humanApprovalRequired": true,
                "timeout": 600000,
                "onFailure": {
                    "retry": {"attempts": 2, "delay": 100},
                    "notification": {"message": "remediation failed"}
                }
            }
        ]
    })
}
