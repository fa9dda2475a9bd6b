//! Assertion utilities for validating execution documents.

use thiserror::Error;

use runbook_core::{Execution, ExecutionStatus, StepRun, StepRunStatus};

/// Error type for execution state validation failures
#[derive(Debug, Error)]
pub enum ExecutionStateError {
    #[error("Invalid execution status: expected {expected}, got {actual}")]
    InvalidStatus { expected: String, actual: String },

    #[error("Step not present in execution: {0}")]
    StepMissing(String),

    #[error("Invalid status for step {step_id}: expected {expected}, got {actual}")]
    InvalidStepStatus {
        step_id: String,
        expected: String,
        actual: String,
    },

    #[error("Flag not raised: {0}")]
    FlagMissing(String),
}

/// Asserts that an execution has the expected status.
pub fn assert_execution_status(
    execution: &Execution,
    expected: ExecutionStatus,
) -> Result<(), ExecutionStateError> {
    if execution.status != expected {
        return Err(ExecutionStateError::InvalidStatus {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", execution.status),
        });
    }
    Ok(())
}

/// Asserts that the named step run has the expected status.
pub fn assert_step_status(
    execution: &Execution,
    step_id: &str,
    expected: StepRunStatus,
) -> Result<(), ExecutionStateError> {
    let run = find_step(execution, step_id)?;
    if run.status != expected {
        return Err(ExecutionStateError::InvalidStepStatus {
            step_id: step_id.to_string(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", run.status),
        });
    }
    Ok(())
}

/// Asserts that a flag of the given type was raised during the execution.
pub fn assert_flag_raised(
    execution: &Execution,
    flag_type: &str,
) -> Result<(), ExecutionStateError> {
    if !execution.flags.iter().any(|flag| flag.flag_type == flag_type) {
        return Err(ExecutionStateError::FlagMissing(flag_type.to_string()));
    }
    Ok(())
}

fn find_step<'a>(
    execution: &'a Execution,
    step_id: &str,
) -> Result<&'a StepRun, ExecutionStateError> {
    execution
        .steps
        .iter()
        .find(|run| run.step_id.0 == step_id)
        .ok_or_else(|| ExecutionStateError::StepMissing(step_id.to_string()))
}
