//! Pure grading and decision rules.
//!
//! Classification maps a detection result to severity, category, priority,
//! and an approval requirement. Decision maps a classification to a named
//! remediation action, either through a custom rule list or a severity-based
//! default table.

use crate::domain::condition::values_equal;
use crate::domain::context::{Classification, Decision, DetectionResult};
use crate::domain::flag::Severity;
use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Action identifiers understood by the execute step.
pub mod actions {
    /// Apply a collaborator-generated remediation
    pub const AUTO_FIX: &str = "autoFix";
    /// Open a certification ticket for manual handling
    pub const CREATE_TICKET: &str = "createTicket";
    /// Revoke access to the affected resources
    pub const BLOCK_ACCESS: &str = "blockAccess";
    /// Notify stakeholders without remediating
    pub const NOTIFY: &str = "notify";
    /// Record the incident in the audit trail only
    pub const LOG: &str = "log";
}

/// Flag types that force a human approval regardless of severity.
const APPROVAL_SENSITIVE_FLAG_TYPES: [&str; 3] =
    ["data_deletion", "system_modification", "access_change"];

/// Grade the severity of a detection result.
///
/// An explicit severity on the result wins; it is also the only way to
/// classify as low. Otherwise: any critical flag, or more than two high
/// flags, grades critical; any high flag grades high; everything else
/// grades medium.
pub fn classify_severity(detection: &DetectionResult) -> Severity {
    if let Some(severity) = detection.severity {
        return severity;
    }

    if detection
        .flags
        .iter()
        .any(|flag| flag.severity == Severity::Critical)
    {
        return Severity::Critical;
    }

    let high_count = detection
        .flags
        .iter()
        .filter(|flag| flag.severity == Severity::High)
        .count();
    if high_count > 2 {
        Severity::Critical
    } else if high_count > 0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Categorize a detection result.
///
/// An explicit category wins, then the type of the first flag, then
/// `unknown`.
pub fn classify_category(detection: &DetectionResult) -> String {
    detection
        .category
        .clone()
        .or_else(|| detection.flags.first().map(|flag| flag.flag_type.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Priority score for a graded detection.
///
/// The severity base score is multiplied by 1.5 for widespread impact and
/// capped at 100.
pub fn classify_priority(severity: Severity, detection: &DetectionResult) -> u32 {
    let base = severity.score() as f64;
    let multiplier = if detection.impact.as_deref() == Some("widespread") {
        1.5
    } else {
        1.0
    };
    ((base * multiplier) as u32).min(100)
}

/// Whether remediation must pass through human approval.
///
/// Critical findings always do; otherwise any approval-sensitive flag type
/// forces the gate.
pub fn requires_approval(severity: Severity, detection: &DetectionResult) -> bool {
    severity == Severity::Critical
        || detection
            .flags
            .iter()
            .any(|flag| APPROVAL_SENSITIVE_FLAG_TYPES.contains(&flag.flag_type.as_str()))
}

/// Full classification of a detection result.
pub fn classify(detection: &DetectionResult) -> Classification {
    let severity = classify_severity(detection);
    Classification {
        severity,
        category: classify_category(detection),
        priority: classify_priority(severity, detection),
        requires_approval: requires_approval(severity, detection),
    }
}

/// Custom decision rule supplied through step parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRule {
    /// Field/value pairs that must all equality-match the classification
    pub conditions: serde_json::Map<String, serde_json::Value>,

    /// Action taken when the rule matches
    pub action: String,

    /// Override for the severity-derived auto-execute flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_execute: Option<bool>,

    /// Override for the severity-derived notification flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_required: Option<bool>,

    /// Override for the severity-derived escalation flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_required: Option<bool>,
}

/// Choose a remediation action for a classification.
///
/// The first custom rule whose conditions all equality-match the
/// classification wins; it overrides the action and any flags it sets
/// explicitly, keeping severity-based defaults for the rest. With no
/// matching rule the default table applies.
pub fn decide(
    classification: &Classification,
    rules: &[DecisionRule],
) -> Result<Decision, CoreError> {
    let subject = serde_json::to_value(classification)?;

    for (index, rule) in rules.iter().enumerate() {
        let matches = rule.conditions.iter().all(|(field, expected)| {
            subject
                .get(field)
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false)
        });
        if matches {
            let mut decision = default_decision(classification);
            decision.action = rule.action.clone();
            decision.matched_rule = Some(index);
            if let Some(auto_execute) = rule.auto_execute {
                decision.auto_execute = auto_execute;
            }
            if let Some(notification_required) = rule.notification_required {
                decision.notification_required = notification_required;
            }
            if let Some(escalation_required) = rule.escalation_required {
                decision.escalation_required = escalation_required;
            }
            return Ok(decision);
        }
    }

    Ok(default_decision(classification))
}

fn default_decision(classification: &Classification) -> Decision {
    let action = match classification.severity {
        Severity::Critical if classification.category == "security" => actions::BLOCK_ACCESS,
        Severity::Critical => actions::CREATE_TICKET,
        Severity::High => actions::AUTO_FIX,
        Severity::Medium => actions::NOTIFY,
        Severity::Low => actions::LOG,
    };

    Decision {
        action: action.to_string(),
        auto_execute: !classification.requires_approval,
        notification_required: matches!(
            classification.severity,
            Severity::Critical | Severity::High
        ),
        escalation_required: classification.severity == Severity::Critical,
        matched_rule: None,
    }
}
