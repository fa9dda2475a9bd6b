//! Workflow definition management

use crate::{
    domain::collaborators::Scheduler,
    domain::execution::WorkflowId,
    domain::repository::WorkflowRepository,
    domain::workflow::{TriggerType, Workflow, WorkflowDefinition},
    CoreError,
};
use std::sync::Arc;

/// Service for managing workflow definitions
pub struct WorkflowService {
    /// Repository for workflows
    workflow_repo: Arc<dyn WorkflowRepository>,

    /// Scheduler collaborator for recurring workflows
    scheduler: Arc<dyn Scheduler>,
}

impl WorkflowService {
    /// Create a new workflow service
    pub fn new(workflow_repo: Arc<dyn WorkflowRepository>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            workflow_repo,
            scheduler,
        }
    }

    /// Validate and store a workflow definition.
    ///
    /// Scheduled workflows are registered with the scheduler; the next run
    /// time, when the backend reports one, lands on the stored workflow.
    pub async fn create_workflow(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<Workflow, CoreError> {
        let mut workflow = Workflow::from_definition(definition)?;

        if workflow.trigger.trigger_type == TriggerType::Scheduled {
            if let Some(schedule) = workflow.trigger.schedule.clone() {
                workflow.next_execution_at =
                    self.scheduler.schedule(&workflow.id, &schedule).await?;
            }
        }

        workflow.version = self.workflow_repo.save(&workflow).await?;

        tracing::info!(
            workflow_id = %workflow.id.0,
            name = %workflow.name,
            trigger = ?workflow.trigger.trigger_type,
            step_count = workflow.steps.len(),
            "Workflow created"
        );

        Ok(workflow)
    }

    /// Get a workflow by id.
    pub async fn get_workflow(&self, workflow_id: &WorkflowId) -> Result<Workflow, CoreError> {
        self.workflow_repo
            .find_by_id(workflow_id)
            .await?
            .ok_or_else(|| CoreError::WorkflowNotFound(workflow_id.0.clone()))
    }

    /// List all stored workflows.
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, CoreError> {
        self.workflow_repo.find_all().await
    }
}
