//! Random test data generators using the `fake` crate, plus `proptest`
//! strategies for property-based tests.

use std::collections::BTreeSet;

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use orchestrator_core::{Priority, Task, TaskFilter, TaskStatus};
use proptest::prelude::*;
use rand::Rng;

/// Generate a realistic agent id from a fixed pool of plausible specialists
pub fn generate_agent_id() -> String {
    let agents = [
        "rust-architect",
        "database-engineer",
        "context-specialist",
        "scheduler-lead",
        "testing-expert",
        "documentation-specialist",
        "security-auditor",
        "performance-optimizer",
    ];
    agents[rand::thread_rng().gen_range(0..agents.len())].to_string()
}

pub fn generate_task_title() -> String {
    Sentence(3..8).fake()
}

pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

pub fn generate_random_task_status() -> TaskStatus {
    let statuses = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Testing,
        TaskStatus::Blocked,
        TaskStatus::Done,
        TaskStatus::Cancelled,
        TaskStatus::Archived,
    ];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// Generate a random task with realistic data, on a fixed branch
pub fn generate_random_task(branch_id: i64) -> Task {
    let id: u32 = (1..99999).fake();
    let status = generate_random_task_status();
    Task {
        id: id as i64,
        branch_id,
        title: generate_task_title(),
        description: generate_task_description(),
        status,
        priority: Priority::Medium,
        details: String::new(),
        estimated_effort: None,
        due_date: None,
        context_id: None,
        assignees: BTreeSet::from([generate_agent_id()]),
        labels: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: if status.is_terminal() { Some(Utc::now()) } else { None },
    }
}

/// Configurable task generator, mirroring a specific branch/agent pool
pub struct TaskGenerator {
    pub branch_id: i64,
    pub agent_pool: Vec<String>,
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGenerator {
    pub fn new() -> Self {
        Self {
            branch_id: 1,
            agent_pool: vec!["agent-1".to_string(), "agent-2".to_string(), "agent-3".to_string()],
        }
    }

    pub fn generate(&self) -> Task {
        let mut task = generate_random_task(self.branch_id);
        let agent = &self.agent_pool[rand::thread_rng().gen_range(0..self.agent_pool.len())];
        task.assignees = BTreeSet::from([agent.clone()]);
        task
    }
}

/// Proptest strategy for generating valid task statuses
pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Review),
        Just(TaskStatus::Testing),
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Done),
        Just(TaskStatus::Cancelled),
        Just(TaskStatus::Archived),
    ]
}

/// Proptest strategy for generating complete tasks on a fixed branch
pub fn task_strategy(branch_id: i64) -> impl Strategy<Value = Task> {
    (
        1i64..99999,
        "[A-Za-z ]{5,50}",
        "[A-Za-z0-9 .,!?]{10,200}",
        "[a-z-]{5,20}",
        task_status_strategy(),
    )
        .prop_map(move |(id, title, description, assignee, status)| {
            let completed_at = if status.is_terminal() { Some(Utc::now()) } else { None };
            Task {
                id,
                branch_id,
                title,
                description,
                status,
                priority: Priority::Medium,
                details: String::new(),
                estimated_effort: None,
                due_date: None,
                context_id: None,
                assignees: BTreeSet::from([assignee]),
                labels: BTreeSet::new(),
                dependencies: BTreeSet::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                completed_at,
            }
        })
}

/// Proptest strategy for generating task filters
pub fn task_filter_strategy() -> impl Strategy<Value = TaskFilter> {
    (proptest::option::of("[a-z-]{5,20}"), proptest::option::of(task_status_strategy()))
        .prop_map(|(assignee, status)| TaskFilter { assignee, status, ..Default::default() })
}
