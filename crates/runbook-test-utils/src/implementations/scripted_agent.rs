//! Scripted analysis agents.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use runbook_core::{Agent, AgentBase, AnalysisInput, CoreError, DetectionResult, Flag, Severity};

/// Agent that replays a scripted sequence of detection outcomes.
///
/// Each call to `analyze` consumes the next scripted outcome; once the
/// script runs out the agent answers with its fallback result. Inputs are
/// recorded so tests can assert on what the engine dispatched.
pub struct ScriptedAgent {
    capability: String,
    script: Mutex<VecDeque<Result<DetectionResult, CoreError>>>,
    fallback: Mutex<DetectionResult>,
    invocations: Mutex<Vec<AnalysisInput>>,
}

impl ScriptedAgent {
    /// Create an agent with an empty script and a clean fallback result.
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(DetectionResult::default()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Create an agent that always raises one flag of the given type.
    pub fn flagging(
        capability: impl Into<String>,
        flag_type: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let flag_type = flag_type.into();
        let agent = Self::new(capability);
        agent.set_fallback(DetectionResult {
            flags: vec![Flag::new(
                flag_type.clone(),
                severity,
                format!("scripted {} finding", flag_type),
            )],
            ..DetectionResult::default()
        });
        agent
    }

    /// Queue a detection result for the next unanswered call.
    pub fn push_result(&self, detection: DetectionResult) {
        self.script.lock().push_back(Ok(detection));
    }

    /// Queue an error for the next unanswered call.
    pub fn push_error(&self, error: CoreError) {
        self.script.lock().push_back(Err(error));
    }

    /// Set the result returned once the script is exhausted.
    pub fn set_fallback(&self, detection: DetectionResult) {
        *self.fallback.lock() = detection;
    }

    /// Inputs received so far, in call order.
    pub fn invocations(&self) -> Vec<AnalysisInput> {
        self.invocations.lock().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

impl AgentBase for ScriptedAgent {
    fn capability(&self) -> &str {
        &self.capability
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn analyze(&self, input: AnalysisInput) -> Result<DetectionResult, CoreError> {
        self.invocations.lock().push(input);
        match self.script.lock().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.fallback.lock().clone()),
        }
    }
}

/// Agent that fails every call with a retryable execution error.
pub struct FailingAgent {
    capability: String,
    message: String,
    calls: Mutex<u32>,
}

impl FailingAgent {
    /// Create an agent that always reports the given failure.
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            message: message.into(),
            calls: Mutex::new(0),
        }
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

impl AgentBase for FailingAgent {
    fn capability(&self) -> &str {
        &self.capability
    }
}

#[async_trait]
impl Agent for FailingAgent {
    async fn analyze(&self, _input: AnalysisInput) -> Result<DetectionResult, CoreError> {
        *self.calls.lock() += 1;
        Err(CoreError::StepExecutionError(self.message.clone()))
    }
}
