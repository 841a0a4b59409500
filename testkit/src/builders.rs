//! Builder pattern implementations for easy test data construction
//!
//! Provides fluent builders for the entities most often assembled by hand
//! in unit tests: tasks, their creation/update payloads, and filters.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use orchestrator_core::{Priority, Task, TaskFilter, TaskStatus, NewTask, UpdateTask};

use crate::fixtures::{create_new_task, create_test_task};

/// Builder for constructing `Task` instances in tests
pub struct TaskBuilder {
    task: Task,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self { task: create_test_task() }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_branch_id(mut self, branch_id: i64) -> Self {
        self.task.branch_id = branch_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        if status.is_terminal() && self.task.completed_at.is_none() {
            self.task.completed_at = Some(Utc::now());
        }
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.task.assignees.insert(assignee.into());
        self
    }

    pub fn with_assignees(mut self, assignees: BTreeSet<String>) -> Self {
        self.task.assignees = assignees;
        self
    }

    pub fn with_dependency(mut self, depends_on: i64) -> Self {
        self.task.dependencies.insert(depends_on);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn with_completed_at(mut self, completed_at: Option<DateTime<Utc>>) -> Self {
        self.task.completed_at = completed_at;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for constructing `NewTask` instances in tests
pub struct NewTaskBuilder {
    new_task: NewTask,
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self { new_task: create_new_task() }
    }

    pub fn with_branch_id(mut self, branch_id: i64) -> Self {
        self.new_task.branch_id = branch_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.new_task.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.new_task.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.new_task.assignees.insert(assignee.into());
        self
    }

    pub fn build(self) -> NewTask {
        self.new_task
    }
}

/// Builder for constructing `UpdateTask` instances in tests
pub struct UpdateTaskBuilder {
    update_task: UpdateTask,
}

impl Default for UpdateTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateTaskBuilder {
    pub fn new() -> Self {
        Self { update_task: UpdateTask::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.update_task.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.update_task.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.update_task.status = Some(status);
        self
    }

    pub fn with_assignees(mut self, assignees: BTreeSet<String>) -> Self {
        self.update_task.assignees = Some(assignees);
        self
    }

    pub fn build(self) -> UpdateTask {
        self.update_task
    }
}

/// Builder for constructing `TaskFilter` instances in tests
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl Default for TaskFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        Self { filter: TaskFilter::default() }
    }

    pub fn with_branch_id(mut self, branch_id: i64) -> Self {
        self.filter.branch_id = Some(branch_id);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.filter.assignee = Some(assignee.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}
