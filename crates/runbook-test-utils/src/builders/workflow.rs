//! Builders for workflow definitions and steps.

use runbook_core::{
    Condition, FailureHandler, NotificationSpec, RetryPolicy, Step, StepId, StepType,
    SuccessHandler, Trigger, WorkflowDefinition,
};

/// Fluent builder for a [`WorkflowDefinition`].
///
/// Starts from a manual trigger and an empty step list; everything else is
/// opt-in.
pub struct WorkflowDefinitionBuilder {
    name: String,
    description: String,
    trigger: Trigger,
    steps: Vec<Step>,
}

impl WorkflowDefinitionBuilder {
    /// Start a definition with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            trigger: Trigger::manual(),
            steps: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the trigger.
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Finish the definition. No validation happens here; invalid
    /// definitions are useful test inputs.
    pub fn build(self) -> WorkflowDefinition {
        WorkflowDefinition {
            name: self.name,
            description: self.description,
            trigger: self.trigger,
            steps: self.steps,
        }
    }
}

/// Fluent builder for a [`Step`].
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    /// Start a step of the given type.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_type: StepType,
        action: impl Into<String>,
    ) -> Self {
        Self {
            step: Step::new(id, name, step_type, action),
        }
    }

    /// Shorthand for a detect step bound to the given agent.
    pub fn detect(
        id: impl Into<String>,
        name: impl Into<String>,
        agent: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let mut builder = Self::new(id, name, StepType::Detect, action);
        builder.step.agent = Some(agent.into());
        builder
    }

    /// Bind the step to an analysis agent.
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.step.agent = Some(agent.into());
        self
    }

    /// Add a handler parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.step.parameters.insert(key.into(), value);
        self
    }

    /// Add a gate condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.step.conditions.push(condition);
        self
    }

    /// Gate the step behind a human approval with the given deadline.
    pub fn approval(mut self, timeout_ms: u64) -> Self {
        self.step.human_approval_required = true;
        self.step.timeout_ms = Some(timeout_ms);
        self
    }

    /// Retry the step on failure.
    pub fn retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.step
            .on_failure
            .get_or_insert_with(FailureHandler::default)
            .retry = Some(RetryPolicy { attempts, delay_ms });
        self
    }

    /// Jump to a later step on success.
    pub fn on_success_jump(mut self, target: impl Into<String>) -> Self {
        self.step
            .on_success
            .get_or_insert_with(SuccessHandler::default)
            .next_step = Some(StepId(target.into()));
        self
    }

    /// Resume from a later step once the failure is final.
    pub fn on_failure_jump(mut self, target: impl Into<String>) -> Self {
        self.step
            .on_failure
            .get_or_insert_with(FailureHandler::default)
            .next_step = Some(StepId(target.into()));
        self
    }

    /// Notify on success.
    pub fn on_success_notify(mut self, notification: NotificationSpec) -> Self {
        self.step
            .on_success
            .get_or_insert_with(SuccessHandler::default)
            .notification = Some(notification);
        self
    }

    /// Notify once the failure is final.
    pub fn on_failure_notify(mut self, notification: NotificationSpec) -> Self {
        self.step
            .on_failure
            .get_or_insert_with(FailureHandler::default)
            .notification = Some(notification);
        self
    }

    /// Finish the step.
    pub fn build(self) -> Step {
        self.step
    }
}
