//! Test implementations (fakes) of the Runbook platform interfaces.
//!
//! Unlike the mocks, these fakes carry real behavior: they record what the
//! engine asked of them and can be scripted per call, so a test can drive a
//! whole execution and assert on the recorded interactions afterwards.

pub mod recording;
pub mod scripted_agent;

pub use recording::*;
pub use scripted_agent::*;
