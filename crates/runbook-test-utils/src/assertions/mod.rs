//! Assertion utilities for validating engine state.

pub mod execution_state;

pub use execution_state::*;
