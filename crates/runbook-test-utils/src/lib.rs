//! Testing utilities for the Runbook platform.
//!
//! This crate provides standardized testing utilities for the Runbook
//! platform, including mocks, test implementations (fakes), fluent builders
//! for workflow documents, assertion utilities, and test data generators.

pub mod assertions;
pub mod builders;
pub mod data_generators;
pub mod implementations;
pub mod mocks;
pub mod util;

/// Re-export commonly used types for convenience
pub use mockall;

pub use builders::{StepBuilder, WorkflowDefinitionBuilder};
pub use implementations::{
    FailingAgent, FixedScheduler, RecordingCertificationService, RecordingDomainUpdater,
    RecordingEventHandler, RecordingNotifier, ScriptedAgent,
};
