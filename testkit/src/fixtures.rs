//! Standard test fixtures for consistent testing
//!
//! Provides pre-built test data including:
//! - A project/branch/task/subtask/agent in various states
//! - Bulk generators for list/filter testing

use std::collections::BTreeSet;

use chrono::Utc;
use orchestrator_core::{
    Agent, AgentAvailability, Branch, BranchStatus, NewAgent, NewBranch, NewProject, NewSubtask,
    NewTask, Priority, Project, ProjectStatus, Subtask, Task, TaskStatus, UpdateTask,
};

/// Create a basic test project with sensible defaults
pub fn create_test_project() -> Project {
    Project {
        id: 1,
        name: "Test Project".to_string(),
        description: "A standard test project with default values".to_string(),
        status: ProjectStatus::Active,
        user_id: "test-user".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        metadata: serde_json::json!({}),
    }
}

pub fn create_new_project() -> NewProject {
    NewProject {
        name: "New Test Project".to_string(),
        description: "A new project for testing creation".to_string(),
        user_id: "test-user".to_string(),
        metadata: serde_json::json!({}),
    }
}

/// Create a basic test branch; `main` is the protected default branch, so
/// fixtures use a distinct name unless the protected path is under test.
pub fn create_test_branch() -> Branch {
    Branch {
        id: 1,
        project_id: 1,
        name: "feature-branch".to_string(),
        description: "A standard test branch".to_string(),
        assigned_agent_id: None,
        priority: Priority::Medium,
        status: BranchStatus::Todo,
        task_count: 0,
        completed_task_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_protected_branch() -> Branch {
    let mut branch = create_test_branch();
    branch.name = Branch::PROTECTED_NAME.to_string();
    branch
}

pub fn create_new_branch() -> NewBranch {
    NewBranch {
        project_id: 1,
        name: "feature-branch".to_string(),
        description: "A new branch for testing creation".to_string(),
        priority: Priority::Medium,
    }
}

/// Create a basic test task with sensible defaults
pub fn create_test_task() -> Task {
    Task {
        id: 1,
        branch_id: 1,
        title: "Test Task".to_string(),
        description: "A standard test task with default values".to_string(),
        status: TaskStatus::Todo,
        priority: Priority::Medium,
        details: String::new(),
        estimated_effort: None,
        due_date: None,
        context_id: None,
        assignees: BTreeSet::new(),
        labels: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: None,
    }
}

/// Create a task in a specific status, setting `completed_at` when terminal.
pub fn create_test_task_with_status(status: TaskStatus) -> Task {
    let mut task = create_test_task();
    task.status = status;
    if status.is_terminal() {
        task.completed_at = Some(Utc::now());
    }
    task
}

pub fn create_test_task_with_assignee(assignee: &str) -> Task {
    let mut task = create_test_task();
    task.assignees.insert(assignee.to_string());
    task
}

/// Create multiple unique tasks on the same branch, cycling through statuses
pub fn create_test_tasks(count: usize) -> Vec<Task> {
    (1..=count)
        .map(|i| {
            let status = match i % 4 {
                0 => TaskStatus::Todo,
                1 => TaskStatus::InProgress,
                2 => TaskStatus::Review,
                _ => TaskStatus::Done,
            };
            let mut task = create_test_task();
            task.id = i as i64;
            task.title = format!("Test Task {i}");
            task.description = format!("Test task number {i} for bulk testing");
            task.assignees = BTreeSet::from([format!("agent-{}", i % 3 + 1)]);
            task.status = status;
            if status.is_terminal() {
                task.completed_at = Some(Utc::now());
            }
            task
        })
        .collect()
}

/// Create one task in each possible status
pub fn create_tasks_in_all_statuses() -> Vec<Task> {
    [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Testing,
        TaskStatus::Blocked,
        TaskStatus::Done,
        TaskStatus::Cancelled,
        TaskStatus::Archived,
    ]
    .into_iter()
    .enumerate()
    .map(|(i, status)| {
        let mut task = create_test_task();
        task.id = (i + 1) as i64;
        task.title = format!("{status} task");
        task.status = status;
        if status.is_terminal() {
            task.completed_at = Some(Utc::now());
        }
        task
    })
    .collect()
}

pub fn create_new_task() -> NewTask {
    NewTask {
        branch_id: 1,
        title: "New Test Task".to_string(),
        description: "A new task for testing creation".to_string(),
        priority: Priority::Medium,
        assignees: BTreeSet::new(),
        labels: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        due_date: None,
        estimated_effort: None,
    }
}

pub fn create_update_task() -> UpdateTask {
    UpdateTask {
        title: Some("Updated Task Name".to_string()),
        description: Some("Updated task description".to_string()),
        ..Default::default()
    }
}

/// Create a basic test subtask, owned by `create_test_task()`'s id
pub fn create_test_subtask() -> Subtask {
    Subtask {
        id: 1,
        task_id: 1,
        title: "Test Subtask".to_string(),
        description: "A standard test subtask".to_string(),
        status: TaskStatus::Todo,
        priority: Priority::Medium,
        assignees: BTreeSet::new(),
        estimated_effort: None,
        progress_percentage: 0.0,
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

pub fn create_new_subtask() -> NewSubtask {
    NewSubtask {
        task_id: 1,
        title: "New Test Subtask".to_string(),
        description: "A new subtask for testing creation".to_string(),
        priority: Priority::Medium,
        assignees: BTreeSet::new(),
        estimated_effort: None,
    }
}

/// Create a basic test agent with capacity for three concurrent tasks
pub fn create_test_agent() -> Agent {
    Agent {
        id: "test-agent".to_string(),
        project_id: 1,
        name: "Test Agent".to_string(),
        description: "A standard test agent".to_string(),
        call_agent: None,
        capabilities: BTreeSet::from(["rust".to_string()]),
        specializations: BTreeSet::new(),
        status: AgentAvailability::Available,
        max_concurrent_tasks: 3,
        current_workload: 0,
        completed_tasks: 0,
        success_rate: 1.0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_test_agent_at_capacity() -> Agent {
    let mut agent = create_test_agent();
    agent.current_workload = agent.max_concurrent_tasks;
    agent
}

pub fn create_new_agent() -> NewAgent {
    NewAgent {
        id: "new-agent".to_string(),
        project_id: 1,
        name: "New Test Agent".to_string(),
        description: "A new agent for testing registration".to_string(),
        call_agent: None,
        capabilities: BTreeSet::new(),
        specializations: BTreeSet::new(),
        max_concurrent_tasks: 3,
    }
}
