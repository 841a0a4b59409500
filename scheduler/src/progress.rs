//! Progress aggregation (§4.4): subtask percentages roll up into a parent
//! task's progress, and task counts roll up into branch status — the
//! latter delegates to `orchestrator_core::state_machine`, which owns the
//! pure rule table.

use orchestrator_core::{BranchStatus, Subtask, TaskStatus};

pub use orchestrator_core::state_machine::derive_branch_status;

/// Unweighted mean of subtask progress; `0.0` for a task with no subtasks.
pub fn aggregate_subtask_progress(subtasks: &[Subtask]) -> f64 {
    if subtasks.is_empty() {
        return 0.0;
    }
    let sum: f64 = subtasks.iter().map(|s| s.progress_percentage).sum();
    sum / subtasks.len() as f64
}

/// The only automatic parent-status transition allowed: `todo -> in_progress`
/// when a subtask starts. Completion is never automatic — it always
/// requires an explicit `CompleteTask` call, even when every subtask is
/// done.
pub fn parent_status_transition(current: TaskStatus, any_subtask_in_progress: bool) -> Option<TaskStatus> {
    if current == TaskStatus::Todo && any_subtask_in_progress {
        Some(TaskStatus::InProgress)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BranchTaskCounts {
    pub task_count: i64,
    pub completed_task_count: i64,
    pub any_blocked: bool,
    pub any_in_progress: bool,
}

pub fn next_branch_status(counts: BranchTaskCounts, previous: BranchStatus) -> BranchStatus {
    derive_branch_status(counts.task_count, counts.completed_task_count, counts.any_blocked, counts.any_in_progress, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchestrator_core::Priority;

    fn subtask(progress: f64) -> Subtask {
        Subtask {
            id: 1,
            task_id: 1,
            title: "s".into(),
            description: String::new(),
            status: TaskStatus::InProgress,
            priority: Priority::Medium,
            assignees: Default::default(),
            estimated_effort: None,
            progress_percentage: progress,
            progress_notes: String::new(),
            blockers: String::new(),
            completion_summary: None,
            impact_on_parent: None,
            insights_found: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn averages_progress_equally() {
        let subtasks = vec![subtask(0.0), subtask(50.0), subtask(100.0)];
        assert_eq!(aggregate_subtask_progress(&subtasks), 50.0);
    }

    #[test]
    fn no_subtasks_is_zero_progress() {
        assert_eq!(aggregate_subtask_progress(&[]), 0.0);
    }

    #[test]
    fn todo_moves_to_in_progress_when_a_subtask_starts() {
        assert_eq!(parent_status_transition(TaskStatus::Todo, true), Some(TaskStatus::InProgress));
    }

    #[test]
    fn completion_is_never_automatic() {
        assert_eq!(parent_status_transition(TaskStatus::InProgress, false), None);
        // Even with every subtask done, the parent does not auto-complete;
        // that path simply never calls this function with an all-done signal.
    }
}
