use crate::domain::approval::ApprovalResponse;
use crate::domain::execution::StepId;
use crate::domain::flag::{Flag, Severity};
use crate::{CoreError, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a detect step, produced by an analysis agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Findings raised by the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,

    /// Aggregate score reported by the agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Explicit category, overriding flag-derived categorization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Blast-radius hint, e.g. `widespread`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    /// Explicit severity override; the only way to classify as low
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Resources the findings pertain to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_resources: Vec<String>,

    /// Agent-specific details
    #[serde(default, skip_serializing_if = "Payload::is_null")]
    pub details: Payload,
}

/// Outcome of a classify step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Graded severity
    pub severity: Severity,

    /// Incident category
    pub category: String,

    /// Priority score, capped at 100
    pub priority: u32,

    /// Whether remediation must pass through human approval
    pub requires_approval: bool,
}

/// Outcome of a decide step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Selected remediation action
    pub action: String,

    /// Whether the action may run without further human input
    pub auto_execute: bool,

    /// Whether stakeholders must be notified
    pub notification_required: bool,

    /// Whether the incident must be escalated
    pub escalation_required: bool,

    /// Position of the custom rule that produced this decision, when one did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<usize>,
}

/// Outcome of an execute step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// Action that was carried out
    pub action: String,

    /// Whether the collaborator reported success
    pub success: bool,

    /// Ticket created by `createTicket` actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,

    /// Remediation created by `autoFix` actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_id: Option<String>,

    /// Notification sent by `notify` actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,

    /// Resources the action touched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_resources: Vec<String>,

    /// Whether the action can be undone
    #[serde(default)]
    pub rollback_available: bool,

    /// Collaborator actions that undo this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_actions: Vec<String>,

    /// Collaborator-specific details
    #[serde(default, skip_serializing_if = "Payload::is_null")]
    pub details: Payload,
}

impl ActionResult {
    /// Result shell for an action, without collaborator references.
    pub fn new(action: impl Into<String>, success: bool) -> Self {
        Self {
            action: action.into(),
            success,
            issue_id: None,
            fix_id: None,
            notification_id: None,
            affected_resources: Vec::new(),
            rollback_available: false,
            rollback_actions: Vec::new(),
            details: Payload::null(),
        }
    }
}

/// Outcome of a verify step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the prior action had its intended effect
    pub verified: bool,

    /// What was checked and what was found
    pub details: String,

    /// Whether the action should be attempted again
    pub retry_required: bool,
}

/// Outcome of an update step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    /// Resources whose domain state was synchronized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_resources: Vec<String>,

    /// Collaborator-specific details
    #[serde(default, skip_serializing_if = "Payload::is_null")]
    pub details: Payload,
}

/// Resolution of a human approval gate, stored as the step result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    /// Always true; rejections surface as errors instead
    pub approved: bool,

    /// Who approved the step
    pub approved_by: String,

    /// Response details, including any modifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ApprovalResponse>,
}

/// Typed result of a single step.
///
/// The kind mirrors the step type that produced it; `Raw` carries payloads
/// from approval modifications or agent passthroughs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepResult {
    /// Detect step outcome
    Detection(DetectionResult),

    /// Classify step outcome
    Classification(Classification),

    /// Decide step outcome
    Decision(Decision),

    /// Execute step outcome
    Action(ActionResult),

    /// Verify step outcome
    Verification(VerificationResult),

    /// Update step outcome
    Update(UpdateResult),

    /// Human approval resolution
    Approval(ApprovalOutcome),

    /// Untyped payload
    Raw(Payload),
}

impl StepResult {
    /// View as a detection result.
    #[inline]
    pub fn as_detection(&self) -> Option<&DetectionResult> {
        match self {
            StepResult::Detection(result) => Some(result),
            _ => None,
        }
    }

    /// View as a classification.
    #[inline]
    pub fn as_classification(&self) -> Option<&Classification> {
        match self {
            StepResult::Classification(result) => Some(result),
            _ => None,
        }
    }

    /// View as a decision.
    #[inline]
    pub fn as_decision(&self) -> Option<&Decision> {
        match self {
            StepResult::Decision(result) => Some(result),
            _ => None,
        }
    }

    /// View as an action result.
    #[inline]
    pub fn as_action(&self) -> Option<&ActionResult> {
        match self {
            StepResult::Action(result) => Some(result),
            _ => None,
        }
    }

    /// Serialize the inner result without the kind tag.
    ///
    /// This is the shape conditions and agents see when they read another
    /// step's result.
    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        let value = match self {
            StepResult::Detection(result) => serde_json::to_value(result)?,
            StepResult::Classification(result) => serde_json::to_value(result)?,
            StepResult::Decision(result) => serde_json::to_value(result)?,
            StepResult::Action(result) => serde_json::to_value(result)?,
            StepResult::Verification(result) => serde_json::to_value(result)?,
            StepResult::Update(result) => serde_json::to_value(result)?,
            StepResult::Approval(result) => serde_json::to_value(result)?,
            StepResult::Raw(payload) => payload.value.clone(),
        };
        Ok(value)
    }
}

/// Shared state of one execution, passed from step to step.
///
/// Results are append-only: each step records exactly one entry, keyed by
/// its step id, and the `latest_*` pointers track the most recent result
/// of each kind for convention-based lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Data supplied by the trigger invocation
    pub trigger: Payload,

    /// One result per completed step
    #[serde(default)]
    pub results: HashMap<StepId, StepResult>,

    /// Step that produced the most recent detection result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_detection: Option<StepId>,

    /// Step that produced the most recent classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_classification: Option<StepId>,

    /// Step that produced the most recent decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_decision: Option<StepId>,

    /// Step that produced the most recent action result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_action: Option<StepId>,

    /// Resources touched by findings and remediations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_resources: Vec<String>,
}

impl ExecutionContext {
    /// Create a context seeded with trigger data.
    pub fn new(trigger: Payload) -> Self {
        Self {
            trigger,
            results: HashMap::new(),
            latest_detection: None,
            latest_classification: None,
            latest_decision: None,
            latest_action: None,
            affected_resources: Vec::new(),
        }
    }

    /// Record a step result.
    ///
    /// Rejects a second write for the same step; the context is append-only.
    pub fn record(&mut self, step_id: StepId, result: StepResult) -> Result<(), CoreError> {
        if self.results.contains_key(&step_id) {
            return Err(CoreError::ExecutionStateError(format!(
                "Context already holds a result for step: {}",
                step_id.0
            )));
        }

        match &result {
            StepResult::Detection(detection) => {
                self.latest_detection = Some(step_id.clone());
                for resource in &detection.affected_resources {
                    self.add_affected_resource(resource.clone());
                }
            }
            StepResult::Classification(_) => {
                self.latest_classification = Some(step_id.clone());
            }
            StepResult::Decision(_) => {
                self.latest_decision = Some(step_id.clone());
            }
            StepResult::Action(action) => {
                self.latest_action = Some(step_id.clone());
                for resource in &action.affected_resources {
                    self.add_affected_resource(resource.clone());
                }
            }
            _ => {}
        }

        self.results.insert(step_id, result);
        Ok(())
    }

    /// Get the result recorded by a step.
    #[inline]
    pub fn get(&self, step_id: &StepId) -> Option<&StepResult> {
        self.results.get(step_id)
    }

    /// Most recent detection result, if any step produced one.
    pub fn latest_detection(&self) -> Option<&DetectionResult> {
        self.latest_detection
            .as_ref()
            .and_then(|step_id| self.results.get(step_id))
            .and_then(StepResult::as_detection)
    }

    /// Most recent classification, if any step produced one.
    pub fn latest_classification(&self) -> Option<&Classification> {
        self.latest_classification
            .as_ref()
            .and_then(|step_id| self.results.get(step_id))
            .and_then(StepResult::as_classification)
    }

    /// Most recent decision, if any step produced one.
    pub fn latest_decision(&self) -> Option<&Decision> {
        self.latest_decision
            .as_ref()
            .and_then(|step_id| self.results.get(step_id))
            .and_then(StepResult::as_decision)
    }

    /// Most recent action result, if any step produced one.
    pub fn latest_action(&self) -> Option<&ActionResult> {
        self.latest_action
            .as_ref()
            .and_then(|step_id| self.results.get(step_id))
            .and_then(StepResult::as_action)
    }

    /// Track a resource touched by a finding or remediation.
    pub fn add_affected_resource(&mut self, resource: String) {
        if !self.affected_resources.contains(&resource) {
            self.affected_resources.push(resource);
        }
    }

    /// Resolve a dotted path against the context.
    ///
    /// The first segment selects the source: `trigger`, a convention key
    /// (`detectionResult`, `classification`, `decision`, `actionResult`,
    /// `affectedResources`), or a step id (with or without a `_result`
    /// suffix). Remaining segments descend into that value. A path whose
    /// first segment matches nothing falls back to a lookup inside the
    /// trigger data.
    pub fn lookup(&self, path: &str) -> Option<serde_json::Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let root = match head {
            "trigger" => Some(self.trigger.value.clone()),
            "detectionResult" => self.result_value(self.latest_detection.as_ref()),
            "classification" => self.result_value(self.latest_classification.as_ref()),
            "decision" => self.result_value(self.latest_decision.as_ref()),
            "actionResult" => self.result_value(self.latest_action.as_ref()),
            "affectedResources" => serde_json::to_value(&self.affected_resources).ok(),
            _ => {
                let step_id = StepId(head.strip_suffix("_result").unwrap_or(head).to_string());
                self.result_value(Some(&step_id))
            }
        };

        match (root, rest) {
            (Some(value), None) => Some(value),
            (Some(value), Some(rest)) => descend(&value, rest).cloned(),
            // Bare trigger fields can be referenced without the prefix
            (None, _) => descend(&self.trigger.value, path).cloned(),
        }
    }

    fn result_value(&self, step_id: Option<&StepId>) -> Option<serde_json::Value> {
        step_id
            .and_then(|id| self.results.get(id))
            .and_then(|result| result.to_value().ok())
    }

    /// Serialize the context into the map shape agents receive as input.
    ///
    /// Step results appear under `<stepId>_result` keys alongside the
    /// convention keys for the most recent result of each kind.
    pub fn snapshot(&self) -> Result<serde_json::Value, CoreError> {
        let mut map = serde_json::Map::new();
        map.insert("trigger".to_string(), self.trigger.value.clone());

        for (step_id, result) in &self.results {
            map.insert(format!("{}_result", step_id.0), result.to_value()?);
        }

        if let Some(detection) = self.latest_detection() {
            map.insert("detectionResult".to_string(), serde_json::to_value(detection)?);
        }
        if let Some(classification) = self.latest_classification() {
            map.insert(
                "classification".to_string(),
                serde_json::to_value(classification)?,
            );
        }
        if let Some(decision) = self.latest_decision() {
            map.insert("decision".to_string(), serde_json::to_value(decision)?);
        }
        if let Some(action) = self.latest_action() {
            map.insert("actionResult".to_string(), serde_json::to_value(action)?);
        }
        if !self.affected_resources.is_empty() {
            map.insert(
                "affectedResources".to_string(),
                serde_json::to_value(&self.affected_resources)?,
            );
        }

        Ok(serde_json::Value::Object(map))
    }
}

fn descend<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
