/// Approval service for human-gated steps
pub mod approval_service;

/// Engine facade and configuration
pub mod engine;

/// Workflow execution engine
pub mod execution_service;

/// Step dispatch against agents and collaborators
pub mod step_executor;

/// Workflow definition management service
pub mod workflow_service;
