//! Contract test helpers for validating `TaskRepository` implementations
//!
//! Any concrete repository (the mock here, or `database`'s SQLite store)
//! should pass this suite to be considered compliant with the trait's
//! documented behavior.

use orchestrator_core::{state_machine, TaskStatus};
use orchestrator_core::TaskRepository;

use crate::{NewTaskBuilder, TaskFilterBuilder, UpdateTaskBuilder};

/// Run the full contract suite against any `TaskRepository` implementation.
pub async fn test_repository_contract<R: TaskRepository>(repo: &R) {
    test_create_contract(repo).await;
    test_update_contract(repo).await;
    test_status_contract(repo).await;
    test_get_contract(repo).await;
    test_list_contract(repo).await;
    test_complete_contract(repo).await;
    test_delete_contract(repo).await;
}

/// Test task creation contract
pub async fn test_create_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Create Contract Task").build();
    let task = repo.create(new_task.clone()).await.expect("create should succeed");

    assert!(task.id > 0, "created task should have a positive id");
    assert_eq!(task.title, new_task.title, "created task should preserve title");
    assert_eq!(task.status, TaskStatus::Todo, "new task should start in Todo status");
    assert!(task.completed_at.is_none(), "new task should not have a completed_at timestamp");
}

/// Test task update contract
pub async fn test_update_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Update Contract Task").build();
    let task = repo.create(new_task).await.expect("create should succeed");

    let update = UpdateTaskBuilder::new()
        .with_title("Updated Title")
        .with_description("Updated description")
        .build();
    let updated = repo.update(task.id, update).await.expect("update should succeed");
    assert_eq!(updated.title, "Updated Title");
    assert_eq!(updated.description, "Updated description");
    assert_eq!(updated.id, task.id, "id should remain unchanged");

    let not_found = repo.update(999_999, UpdateTaskBuilder::new().build()).await;
    assert!(not_found.is_err(), "should fail to update a non-existent task");
}

/// Test status transition contract
pub async fn test_status_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Status Contract Task").build();
    let task = repo.create(new_task).await.expect("create should succeed");

    assert!(state_machine::can_transition(TaskStatus::Todo, TaskStatus::InProgress));
    let in_progress =
        repo.set_status(task.id, TaskStatus::InProgress).await.expect("valid transition should succeed");
    assert_eq!(in_progress.status, TaskStatus::InProgress);

    let done = repo.set_status(task.id, TaskStatus::Done).await.expect("transition to Done should succeed");
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.completed_at.is_some(), "a task reaching a terminal status should record completed_at");

    let not_found = repo.set_status(999_999, TaskStatus::InProgress).await;
    assert!(not_found.is_err(), "should fail for a non-existent task");
}

/// Test get contract
pub async fn test_get_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Get Contract Task").build();
    let task = repo.create(new_task).await.expect("create should succeed");

    let retrieved = repo.get(task.id).await.expect("get should succeed").expect("task should exist");
    assert_eq!(retrieved.id, task.id);
    assert_eq!(retrieved.title, task.title);

    let missing = repo.get(999_999).await.expect("get should not error for a missing id");
    assert!(missing.is_none(), "should return None for a non-existent id");
}

/// Test list and list_by_branch contract
pub async fn test_list_contract<R: TaskRepository>(repo: &R) {
    let branch_id = 42;
    let tasks = vec![
        NewTaskBuilder::new().with_branch_id(branch_id).with_title("List 1").with_assignee("agent-1").build(),
        NewTaskBuilder::new().with_branch_id(branch_id).with_title("List 2").with_assignee("agent-2").build(),
        NewTaskBuilder::new().with_branch_id(branch_id).with_title("List 3").with_assignee("agent-1").build(),
    ];

    let mut created = Vec::new();
    for new_task in tasks {
        created.push(repo.create(new_task).await.expect("create should succeed"));
    }
    repo.set_status(created[1].id, TaskStatus::InProgress).await.expect("status change should succeed");

    let by_branch = repo.list_by_branch(branch_id).await.expect("list_by_branch should succeed");
    assert!(by_branch.len() >= 3, "should contain at least our created tasks");

    let filtered = repo
        .list(TaskFilterBuilder::new().with_branch_id(branch_id).with_assignee("agent-1").build())
        .await
        .expect("filtered list should succeed");
    assert!(
        filtered.iter().all(|t| t.assignees.contains("agent-1")),
        "all returned tasks should be assigned to agent-1"
    );

    let by_status = repo
        .list(TaskFilterBuilder::new().with_branch_id(branch_id).with_status(TaskStatus::InProgress).build())
        .await
        .expect("filtered list by status should succeed");
    assert!(
        by_status.iter().all(|t| t.status == TaskStatus::InProgress),
        "all returned tasks should be InProgress"
    );
}

/// Test completion contract
pub async fn test_complete_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Complete Contract Task").build();
    let task = repo.create(new_task).await.expect("create should succeed");

    let completed = repo
        .complete(task.id, "done".to_string(), Some("passed".to_string()), false)
        .await
        .expect("complete should succeed");
    assert_eq!(completed.status, TaskStatus::Done);
    assert!(completed.completed_at.is_some(), "completed task should record completed_at");

    let not_found = repo.complete(999_999, "done".to_string(), None, false).await;
    assert!(not_found.is_err(), "should fail for a non-existent task");
}

/// Test delete contract
pub async fn test_delete_contract<R: TaskRepository>(repo: &R) {
    let new_task = NewTaskBuilder::new().with_title("Delete Contract Task").build();
    let task = repo.create(new_task).await.expect("create should succeed");

    repo.delete(task.id).await.expect("delete should succeed");
    let missing = repo.get(task.id).await.expect("get should not error");
    assert!(missing.is_none(), "task should be gone after delete");

    let not_found = repo.delete(999_999).await;
    assert!(not_found.is_err(), "should fail to delete a non-existent task");
}
