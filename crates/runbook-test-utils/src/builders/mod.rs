//! Fluent builders for workflow documents.

pub mod workflow;

pub use workflow::{StepBuilder, WorkflowDefinitionBuilder};
