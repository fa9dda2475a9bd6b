/// Execution domain models
pub mod execution;

/// Domain events
pub mod events;

/// Workflow definition domain models
pub mod workflow;

/// Compliance flags and severities
pub mod flag;

/// Step results and the execution context
pub mod context;

/// Step condition evaluation
pub mod condition;

/// Classification and decision rules
pub mod rules;

/// Approval domain models
pub mod approval;

/// Repository interfaces
pub mod repository;

/// Collaborator service interfaces
pub mod collaborators;
