//! `NextTask` selection (§4.4): readiness filtering, composite ordering,
//! and the advisory `workflow_guidance` attached to the winning candidate.

use std::sync::Arc;

use orchestrator_core::{
    DependencyRepository, DependencyType, OrchestratorError, Result, Task, TaskRepository, TaskStatus,
};
use serde_json::Value;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkflowGuidance {
    pub recommended_agent: Option<String>,
    pub checklist: Vec<String>,
    pub unblocks: Vec<i64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskCandidate {
    pub task: Task,
    pub resolved_context: Option<Value>,
    pub workflow_guidance: WorkflowGuidance,
}

/// Why no task was selected, so a caller can surface a useful diagnostic
/// instead of a bare "nothing to do".
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NextTaskDiagnostic {
    pub candidates_considered: usize,
    pub blocked_count: usize,
    pub missing_dependency_count: usize,
    pub agent_mismatch_count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub enum NextTaskOutcome {
    Found(TaskCandidate),
    NotFound(NextTaskDiagnostic),
}

struct Readiness {
    ready: bool,
    blocked: bool,
    missing_dependency: bool,
    agent_mismatch: bool,
}

async fn readiness(
    task: &Task,
    tasks: &dyn TaskRepository,
    dependencies: &dyn DependencyRepository,
    branch_assigned_agent: Option<&str>,
    requesting_agent: Option<&str>,
) -> Result<Readiness> {
    if task.status == TaskStatus::Blocked {
        return Ok(Readiness { ready: false, blocked: true, missing_dependency: false, agent_mismatch: false });
    }

    // Every `Blocks` prerequisite must itself be `done`; a dangling edge
    // (prerequisite deleted) is treated as unmet rather than satisfied.
    let mut missing_dependency = false;
    for edge in dependencies.list_for_task(task.id).await? {
        if edge.dep_type != DependencyType::Blocks {
            continue;
        }
        let prerequisite_done = matches!(
            tasks.get(edge.depends_on_task_id).await?,
            Some(prereq) if prereq.status == TaskStatus::Done
        );
        if !prerequisite_done {
            missing_dependency = true;
            break;
        }
    }

    let agent_mismatch = match requesting_agent {
        Some(agent) => {
            let assignees_allow = task.assignees.is_empty() || task.assignees.contains(agent);
            let branch_allows = branch_assigned_agent == Some(agent);
            !(assignees_allow || branch_allows)
        }
        None => false,
    };

    Ok(Readiness {
        ready: !missing_dependency && !agent_mismatch,
        blocked: false,
        missing_dependency,
        agent_mismatch,
    })
}

fn recommended_agent(task: &Task) -> Option<String> {
    if let Some(first) = task.assignees.iter().next() {
        return Some(first.clone());
    }
    const LABEL_AGENTS: &[(&str, &str)] = &[
        ("frontend", "frontend-agent"),
        ("backend", "backend-agent"),
        ("api", "backend-agent"),
        ("test", "qa-agent"),
        ("qa", "qa-agent"),
        ("docs", "docs-agent"),
        ("infra", "platform-agent"),
        ("devops", "platform-agent"),
    ];
    task.labels.iter().find_map(|label| {
        LABEL_AGENTS.iter().find(|(needle, _)| label.contains(needle)).map(|(_, agent)| agent.to_string())
    })
}

fn checklist_for(status: TaskStatus) -> Vec<String> {
    let steps: &[(&str, TaskStatus)] = &[
        ("Start implementation", TaskStatus::InProgress),
        ("Request review", TaskStatus::Review),
        ("Run tests", TaskStatus::Testing),
        ("Complete the task", TaskStatus::Done),
    ];
    let start = match status {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Review => 2,
        TaskStatus::Testing => 3,
        _ => steps.len(),
    };
    steps[start..].iter().map(|(label, _)| label.to_string()).collect()
}

/// Composite sort key per §4.4 step 3: priority desc, due_date asc (nulls
/// last), created_at asc, id asc.
fn sort_key(task: &Task) -> (std::cmp::Reverse<u8>, i64, chrono::DateTime<chrono::Utc>, i64) {
    let due_sort = task.due_date.map(|d| d.timestamp()).unwrap_or(i64::MAX);
    (std::cmp::Reverse(task.priority.rank()), due_sort, task.created_at, task.id)
}

#[allow(clippy::too_many_arguments)]
pub async fn select_next_task(
    tasks: &dyn TaskRepository,
    dependencies: &dyn DependencyRepository,
    branch_id: i64,
    branch_assigned_agent: Option<&str>,
    requesting_agent: Option<&str>,
) -> Result<NextTaskOutcome> {
    let candidates: Vec<Task> = tasks
        .list_by_branch(branch_id)
        .await?
        .into_iter()
        .filter(|t| matches!(t.status, TaskStatus::Todo | TaskStatus::InProgress))
        .collect();

    if candidates.is_empty() {
        return Ok(NextTaskOutcome::NotFound(NextTaskDiagnostic::default()));
    }

    let mut ready = Vec::new();
    let mut blocked_count = 0usize;
    let mut missing_dependency_count = 0usize;
    let mut agent_mismatch_count = 0usize;

    for task in &candidates {
        let r = readiness(task, tasks, dependencies, branch_assigned_agent, requesting_agent).await?;
        if r.blocked {
            blocked_count += 1;
        }
        if r.missing_dependency {
            missing_dependency_count += 1;
        }
        if r.agent_mismatch {
            agent_mismatch_count += 1;
        }
        if r.ready {
            ready.push(task.clone());
        }
    }

    ready.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    match ready.into_iter().next() {
        Some(task) => {
            let unblocks = dependencies.dependents_of(task.id).await?;
            let guidance = WorkflowGuidance {
                recommended_agent: recommended_agent(&task),
                checklist: checklist_for(task.status),
                unblocks,
            };
            Ok(NextTaskOutcome::Found(TaskCandidate { task, resolved_context: None, workflow_guidance: guidance }))
        }
        None => Ok(NextTaskOutcome::NotFound(NextTaskDiagnostic {
            candidates_considered: candidates.len(),
            blocked_count,
            missing_dependency_count,
            agent_mismatch_count,
        })),
    }
}

/// Surfaced so callers that only have a branch id (no loaded `Branch`) can
/// still fail closed rather than silently ignoring a missing branch.
pub fn require_branch(branch: Option<orchestrator_core::Branch>, branch_id: i64) -> Result<orchestrator_core::Branch> {
    branch.ok_or_else(|| OrchestratorError::not_found("branch", branch_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_shrinks_as_status_advances() {
        assert_eq!(checklist_for(TaskStatus::Todo).len(), 4);
        assert_eq!(checklist_for(TaskStatus::Testing).len(), 1);
        assert_eq!(checklist_for(TaskStatus::Done).len(), 0);
    }

    #[test]
    fn recommended_agent_prefers_explicit_assignee() {
        let mut task = sample_task();
        task.assignees.insert("alice".to_string());
        task.labels.insert("frontend".to_string());
        assert_eq!(recommended_agent(&task), Some("alice".to_string()));
    }

    #[test]
    fn recommended_agent_falls_back_to_label_mapping() {
        let mut task = sample_task();
        task.labels.insert("frontend_ui".to_string());
        assert_eq!(recommended_agent(&task), Some("frontend-agent".to_string()));
    }

    fn sample_task() -> Task {
        Task {
            id: 1,
            branch_id: 1,
            title: "t".into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: orchestrator_core::Priority::Medium,
            details: String::new(),
            estimated_effort: None,
            due_date: None,
            context_id: None,
            assignees: Default::default(),
            labels: Default::default(),
            dependencies: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            completed_at: None,
        }
    }
}
