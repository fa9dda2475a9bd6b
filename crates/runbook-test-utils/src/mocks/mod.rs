//! Mock implementations of key Runbook platform interfaces.
//!
//! This module provides mockall-generated mocks for the collaborator and
//! state store traits the engine depends on, allowing for isolated,
//! controlled testing of services that use these interfaces. Use the fakes
//! in [`crate::implementations`] instead when a test drives a whole
//! execution and asserts on recorded interactions afterwards.

pub mod collaborators;
pub mod repositories;

// Re-export all mocks and their creator functions for easy access
pub use collaborators::*;
pub use repositories::*;
