//! Collaborator services for the Runbook core
//!
//! This module defines the interfaces the engine uses to reach the rest of
//! the compliance platform. The engine never talks to ticketing, messaging
//! or resource stores directly; it goes through these traits so deployments
//! can wire in their own integrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::execution::WorkflowId;
use super::flag::Severity;
use crate::error::CoreError;
use crate::types::Payload;

/// Status of a remediation issue in the certification system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Issue has been created and not yet picked up
    Open,

    /// Issue is being worked on
    InProgress,

    /// Issue has been resolved
    Resolved,

    /// Issue has been closed without resolution
    Closed,
}

/// Request to open a remediation issue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    /// Short title for the issue
    pub title: String,

    /// Longer description of what was found
    pub description: String,

    /// Severity the classification assigned
    pub severity: Severity,

    /// Resources the issue concerns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_resources: Vec<String>,

    /// Additional structured detail
    #[serde(default, skip_serializing_if = "Payload::is_null")]
    pub details: Payload,
}

/// A remediation issue as recorded by the certification system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Identifier assigned by the certification system
    pub id: String,

    /// Title as recorded
    pub title: String,

    /// Current status
    pub status: IssueStatus,

    /// Link to the issue, when the backend has a UI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// An automated fix applied by the certification system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFix {
    /// Identifier assigned by the certification system
    pub id: String,

    /// Issue this fix belongs to, when one was opened first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,

    /// What the fix changed
    pub description: String,

    /// Whether the fix can be undone
    pub rollback_available: bool,

    /// Undo steps, in the order they should run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_actions: Vec<String>,
}

/// Issue tracking, automated fixes and score recalculation
#[async_trait]
pub trait CertificationService: Send + Sync {
    /// Open a remediation issue
    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, CoreError>;

    /// Apply an automated fix for the given issue
    async fn create_auto_fix(
        &self,
        issue_id: &str,
        description: &str,
    ) -> Result<AutoFix, CoreError>;

    /// Recalculate compliance scores for the given resources
    async fn calculate_scores(
        &self,
        resource_ids: &[String],
    ) -> Result<HashMap<String, f64>, CoreError>;

    /// Look up the current status of an issue
    async fn issue_status(&self, issue_id: &str) -> Result<IssueStatus, CoreError>;

    /// Undo a previously applied automated fix
    async fn rollback_auto_fix(&self, fix_id: &str) -> Result<(), CoreError>;
}

/// Request to send a notification to humans
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    /// Who should receive the notification
    pub recipients: Vec<String>,

    /// Delivery channels, e.g. "email" or "chat"
    pub channels: Vec<String>,

    /// Priority label, usually the classification severity
    pub priority: String,

    /// Subject line
    pub subject: String,

    /// Message body
    pub body: String,

    /// Additional structured detail
    #[serde(default, skip_serializing_if = "Payload::is_null")]
    pub metadata: Payload,
}

/// A notification accepted for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Identifier assigned by the notification system
    pub id: String,

    /// When the notification was accepted
    pub sent_at: DateTime<Utc>,
}

/// Delivery of notifications to approvers and operators
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a notification, returning the delivery record
    async fn send(&self, request: &NotificationRequest) -> Result<Notification, CoreError>;
}

/// Partial updates to compliance resource documents
#[async_trait]
pub trait DomainUpdater: Send + Sync {
    /// Apply a partial update to the given resource
    async fn update(&self, resource_id: &str, partial: &Payload) -> Result<(), CoreError>;
}

/// Registration of recurring workflow schedules
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a schedule for the workflow and return the next run time,
    /// when the backend can compute one
    async fn schedule(
        &self,
        workflow_id: &WorkflowId,
        schedule: &str,
    ) -> Result<Option<DateTime<Utc>>, CoreError>;
}
