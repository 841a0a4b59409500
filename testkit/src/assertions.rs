//! Custom assertion helpers for testing
//!
//! Provides specialized assertions for task equality, state-transition
//! validation (backed by `orchestrator_core::state_machine`), and
//! collection-based matching.

use orchestrator_core::{state_machine, Task, TaskStatus};

/// Assert tasks are equal ignoring timestamps
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "task IDs don't match");
    assert_eq!(actual.branch_id, expected.branch_id, "task branch IDs don't match");
    assert_eq!(actual.title, expected.title, "task titles don't match");
    assert_eq!(actual.description, expected.description, "task descriptions don't match");
    assert_eq!(actual.status, expected.status, "task statuses don't match");
    assert_eq!(actual.assignees, expected.assignees, "task assignees don't match");
}

/// Assert tasks are equal including exact timestamps
pub fn assert_task_equals_exact(actual: &Task, expected: &Task) {
    assert_eq!(actual, expected, "tasks are not exactly equal");
}

/// Assert task matches partial criteria
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(expected_id) = matcher.id {
        assert_eq!(task.id, expected_id, "task ID doesn't match expected");
    }
    if let Some(ref expected_title) = matcher.title {
        assert_eq!(&task.title, expected_title, "task title doesn't match expected");
    }
    if let Some(ref expected_assignee) = matcher.assignee {
        assert!(
            task.assignees.contains(expected_assignee),
            "task assignees {:?} don't contain expected '{expected_assignee}'",
            task.assignees
        );
    }
    if let Some(expected_status) = matcher.status {
        assert_eq!(task.status, expected_status, "task status doesn't match expected");
    }
}

/// Assert a status transition is valid per the state machine
pub fn assert_transition_valid(from: TaskStatus, to: TaskStatus) {
    assert!(
        state_machine::can_transition(from, to),
        "expected transition from {from:?} to {to:?} to be valid, but it's not"
    );
}

/// Assert a status transition is invalid per the state machine
pub fn assert_transition_invalid(from: TaskStatus, to: TaskStatus) {
    assert!(
        !state_machine::can_transition(from, to),
        "expected transition from {from:?} to {to:?} to be invalid, but it's valid"
    );
}

/// Assert task list contains a task with the given title
pub fn assert_contains_task_with_title(tasks: &[Task], title: &str) {
    assert!(
        tasks.iter().any(|t| t.title == title),
        "expected to find task titled '{}' in task list, but it wasn't found. Available titles: {:?}",
        title,
        tasks.iter().map(|t| &t.title).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date (most recent first)
pub fn assert_tasks_sorted_by_date(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "tasks are not sorted by creation date (most recent first): '{}' ({}) comes before '{}' ({})",
            window[0].title,
            window[0].created_at,
            window[1].title,
            window[1].created_at
        );
    }
}

/// Flexible task matcher for partial assertions
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}
