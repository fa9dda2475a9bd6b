use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding raised by an analysis agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Requires immediate attention, always gated behind approval
    Critical,
    /// Significant finding, eligible for automatic remediation
    High,
    /// Default severity for routine findings
    Medium,
    /// Informational, only produced by explicit agent overrides
    Low,
}

impl Severity {
    /// Base priority score used when ranking classified executions.
    pub fn score(&self) -> u32 {
        match self {
            Severity::Critical => 100,
            Severity::High => 75,
            Severity::Medium => 50,
            Severity::Low => 25,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// A typed, severity-tagged finding produced during detection.
///
/// Flags accumulate onto the owning execution as steps run; classification
/// and approval rules read them back to grade the incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// Finding category, e.g. `boundary_violation` or `data_deletion`
    #[serde(rename = "type")]
    pub flag_type: String,
    /// Severity assigned by the producing agent
    pub severity: Severity,
    /// Human-readable description of the finding
    pub message: String,
    /// Optional agent-specific details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Flag {
    /// Create a flag without metadata.
    pub fn new(
        flag_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            flag_type: flag_type.into(),
            severity,
            message: message.into(),
            metadata: None,
        }
    }
}
