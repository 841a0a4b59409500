//! Scheduler (C4): `NextTask` selection and progress/status aggregation.
//!
//! - [`next_task`] — readiness filtering, composite ordering, diagnostics,
//!   and `workflow_guidance` construction.
//! - [`progress`] — subtask-to-task and task-to-branch aggregation rules.

pub mod next_task;
pub mod progress;

use std::sync::Arc;

use orchestrator_core::{Branch, BranchRepository, DependencyRepository, Result, TaskRepository, Tier};
use orchestrator_context::ContextEngine;

pub use next_task::{NextTaskDiagnostic, NextTaskOutcome, TaskCandidate, WorkflowGuidance};

pub struct Scheduler {
    tasks: Arc<dyn TaskRepository>,
    branches: Arc<dyn BranchRepository>,
    dependencies: Arc<dyn DependencyRepository>,
    context: Option<Arc<ContextEngine>>,
}

impl Scheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        branches: Arc<dyn BranchRepository>,
        dependencies: Arc<dyn DependencyRepository>,
        context: Option<Arc<ContextEngine>>,
    ) -> Self {
        Self { tasks, branches, dependencies, context }
    }

    pub async fn branch(&self, branch_id: i64) -> Result<Branch> {
        next_task::require_branch(self.branches.get(branch_id).await?, branch_id)
    }

    pub async fn next_task(
        &self,
        branch_id: i64,
        requesting_agent: Option<&str>,
        include_context: bool,
    ) -> Result<NextTaskOutcome> {
        let branch = self.branch(branch_id).await?;
        let outcome = next_task::select_next_task(
            self.tasks.as_ref(),
            self.dependencies.as_ref(),
            branch_id,
            branch.assigned_agent_id.as_deref(),
            requesting_agent,
        )
        .await?;

        let outcome = match outcome {
            NextTaskOutcome::Found(mut candidate) if include_context => {
                if let Some(context) = &self.context {
                    let entry = context.resolve(Tier::Task(candidate.task.id), false).await?;
                    candidate.resolved_context = Some(entry.resolved_context);
                }
                NextTaskOutcome::Found(candidate)
            }
            other => other,
        };

        Ok(outcome)
    }
}
