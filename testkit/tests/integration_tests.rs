//! Integration tests for the testkit crate
//!
//! Tests the mock implementations and utilities to ensure they work
//! correctly and provide the expected testing capabilities.

use orchestrator_core::{OrchestratorError, TaskRepository, TaskStatus};
use orchestrator_testkit::*;

#[tokio::test]
async fn test_mock_repository_basic_operations() {
    let repo = MockTaskRepository::new();

    let new_task = NewTaskBuilder::new().with_title("NEW-001").build();
    let task = repo.create(new_task).await.unwrap();

    assert_eq!(task.id, 1);
    assert_eq!(task.title, "NEW-001");
    assert_eq!(task.status, TaskStatus::Todo);

    repo.assert_called("create");

    let retrieved = repo.get(task.id).await.unwrap().unwrap();
    assert_eq!(retrieved.id, task.id);

    repo.assert_called("get");
}

#[tokio::test]
async fn test_mock_repository_error_injection() {
    let repo = MockTaskRepository::new();

    repo.inject_error(OrchestratorError::not_found("task", 1));

    let result = repo.get(1).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_not_found());

    repo.clear_error();
    let result = repo.get(1).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_mock_repository_state_transitions() {
    let repo = MockTaskRepository::new();

    let new_task = NewTaskBuilder::new().with_title("State Task").build();
    let task = repo.create(new_task).await.unwrap();

    let updated_task = repo.set_status(task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(updated_task.status, TaskStatus::InProgress);
    assert_eq!(updated_task.id, task.id);
}

#[tokio::test]
async fn test_fixtures_create_tasks_in_all_statuses() {
    let tasks = create_tasks_in_all_statuses();

    assert_eq!(tasks.len(), 8);

    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    assert!(statuses.contains(&TaskStatus::Todo));
    assert!(statuses.contains(&TaskStatus::InProgress));
    assert!(statuses.contains(&TaskStatus::Blocked));
    assert!(statuses.contains(&TaskStatus::Review));
    assert!(statuses.contains(&TaskStatus::Done));
    assert!(statuses.contains(&TaskStatus::Archived));

    let done_tasks: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Done).collect();
    assert!(done_tasks[0].completed_at.is_some());
}

#[tokio::test]
async fn test_builders_task_builder() {
    let task = TaskBuilder::new()
        .with_id(42)
        .with_title("Built Task")
        .with_status(TaskStatus::InProgress)
        .with_assignee("builder-agent")
        .build();

    assert_eq!(task.id, 42);
    assert_eq!(task.title, "Built Task");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.assignees.contains("builder-agent"));
}

#[tokio::test]
async fn test_assertions_task_equals() {
    let task1 = create_test_task();
    let mut task2 = task1.clone();

    assert_task_equals(&task1, &task2);

    task2.title = "Different Title".to_string();

    let result = std::panic::catch_unwind(|| {
        assert_task_equals(&task1, &task2);
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn test_assertions_state_transitions() {
    assert_transition_valid(TaskStatus::Todo, TaskStatus::InProgress);
    assert_transition_valid(TaskStatus::InProgress, TaskStatus::Done);

    assert_transition_invalid(TaskStatus::Done, TaskStatus::InProgress);
    assert_transition_invalid(TaskStatus::Todo, TaskStatus::Done);
}

#[tokio::test]
async fn test_generators_realistic_data() {
    let task = generate_random_task(1);

    assert!(task.id > 0);
    assert!(!task.title.is_empty());
    assert!(!task.description.is_empty());
}

#[tokio::test]
async fn test_mock_repository_concurrent_access() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let repo = Arc::new(MockTaskRepository::new());
    let mut set = JoinSet::new();

    for i in 0..10 {
        let repo_clone = repo.clone();
        set.spawn(async move {
            let new_task = NewTaskBuilder::new().with_title(format!("Concurrent Task {i}")).build();
            repo_clone.create(new_task).await.unwrap()
        });
    }

    let mut tasks = Vec::new();
    while let Some(result) = set.join_next().await {
        tasks.push(result.unwrap());
    }

    assert_eq!(tasks.len(), 10);

    let mut ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_mock_repository_call_history() {
    let tasks = create_tasks_in_all_statuses();
    let repo_with_tasks = MockTaskRepository::with_tasks(tasks);

    let _ = repo_with_tasks.list_by_branch(1).await.unwrap();
    repo_with_tasks.assert_called("list_by_branch");
}

#[tokio::test]
async fn test_contract_tests_with_mock() {
    let repo = MockTaskRepository::new();

    test_repository_contract(&repo).await;

    let history = repo.call_history();
    assert!(!history.is_empty(), "mock should have recorded method calls");
    assert!(history.iter().any(|call| call.contains("create")), "should have called create");
    assert!(history.iter().any(|call| call.contains("get")), "should have called get");
}
