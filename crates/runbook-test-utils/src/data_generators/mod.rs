//! Generators for test workflow documents.

pub mod definitions;

pub use definitions::*;
