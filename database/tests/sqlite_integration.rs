//! Integration tests exercising the SQLite-backed repositories directly
//! (bypassing the facade), covering lifecycle, filtering, concurrency, and
//! health/stats behavior against a real migrated database.

use std::collections::BTreeSet;
use std::time::Duration;

use database::{SqliteBranchRepository, SqliteHealthRepository, SqliteProjectRepository, SqliteStore, SqliteTaskRepository};
use orchestrator_core::{
    BranchRepository, HealthRepository, NewBranch, NewProject, NewTask, Priority, ProjectRepository, TaskFilter,
    TaskRepository, TaskStatus,
};
use tokio::time::Instant;

struct Fixture {
    tasks: SqliteTaskRepository,
    health: SqliteHealthRepository,
    branch_id: i64,
}

async fn setup() -> Fixture {
    let store = SqliteStore::new(":memory:").await.expect("store should open");
    store.migrate().await.expect("migrations should apply");

    let projects = SqliteProjectRepository::new(store.pool().clone());
    let project = projects
        .create(NewProject {
            name: "Integration Project".to_string(),
            description: "seeded for sqlite integration tests".to_string(),
            user_id: "integration-user".to_string(),
            metadata: serde_json::json!({}),
        })
        .await
        .expect("project should be created");

    let branches = SqliteBranchRepository::new(store.pool().clone());
    let branch = branches
        .create(NewBranch {
            project_id: project.id,
            name: "integration-branch".to_string(),
            description: "seeded for sqlite integration tests".to_string(),
            priority: Priority::Medium,
        })
        .await
        .expect("branch should be created");

    Fixture {
        tasks: SqliteTaskRepository::new(store.pool().clone()),
        health: SqliteHealthRepository::new(store.pool().clone()),
        branch_id: branch.id,
    }
}

fn new_task(branch_id: i64, title: &str, assignee: Option<&str>) -> NewTask {
    NewTask {
        branch_id,
        title: title.to_string(),
        description: format!("description for {title}"),
        priority: Priority::Medium,
        assignees: assignee.map(|a| BTreeSet::from([a.to_string()])).unwrap_or_default(),
        labels: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        due_date: None,
        estimated_effort: None,
    }
}

#[tokio::test]
async fn empty_database_reports_healthy_with_zeroed_stats() {
    let fx = setup().await;

    fx.health.health_check().await.expect("health check should pass");
    let stats = fx.health.get_stats().await.expect("stats should be retrievable");
    assert_eq!(stats.task_count, 0);
    assert_eq!(stats.project_count, 1);
    assert_eq!(stats.branch_count, 1);
}

#[tokio::test]
async fn full_task_lifecycle() {
    let fx = setup().await;

    let task = fx.tasks.create(new_task(fx.branch_id, "Lifecycle", Some("test-agent"))).await.unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
    assert!(task.completed_at.is_none());

    let task = fx.tasks.set_status(task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    let task = fx.tasks.set_status(task.id, TaskStatus::Review).await.unwrap();
    assert_eq!(task.status, TaskStatus::Review);

    let task = fx.tasks.complete(task.id, "all done".to_string(), Some("passed".to_string()), false).await.unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert!(task.completed_at.is_some());

    let retrieved = fx.tasks.get(task.id).await.unwrap();
    assert!(retrieved.is_some());
    assert_eq!(retrieved.unwrap().status, TaskStatus::Done);
}

#[tokio::test]
async fn task_updates_are_partial() {
    let fx = setup().await;

    let task = fx.tasks.create(new_task(fx.branch_id, "Original Name", Some("original-agent"))).await.unwrap();

    let full_update = orchestrator_core::UpdateTask {
        title: Some("Updated Name".to_string()),
        description: Some("Updated description".to_string()),
        ..Default::default()
    };
    let updated = fx.tasks.update(task.id, full_update).await.unwrap();
    assert_eq!(updated.title, "Updated Name");
    assert_eq!(updated.description, "Updated description");

    let partial_update = orchestrator_core::UpdateTask { title: Some("Partially Updated".to_string()), ..Default::default() };
    let partially_updated = fx.tasks.update(task.id, partial_update).await.unwrap();
    assert_eq!(partially_updated.title, "Partially Updated");
    assert_eq!(partially_updated.description, "Updated description", "untouched field should remain as is");
}

#[tokio::test]
async fn task_retrieval_distinguishes_missing_from_present() {
    let fx = setup().await;

    let task = fx.tasks.create(new_task(fx.branch_id, "Retrieval", Some("test-agent"))).await.unwrap();

    let found = fx.tasks.get(task.id).await.unwrap();
    assert_eq!(found.unwrap().id, task.id);

    let missing = fx.tasks.get(999_999).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn task_filtering_by_assignee_and_status() {
    let fx = setup().await;

    let t1 = fx.tasks.create(new_task(fx.branch_id, "Agent 1 Task 1", Some("agent-1"))).await.unwrap();
    fx.tasks.create(new_task(fx.branch_id, "Agent 1 Task 2", Some("agent-1"))).await.unwrap();
    fx.tasks.create(new_task(fx.branch_id, "Agent 2 Task", Some("agent-2"))).await.unwrap();

    fx.tasks.set_status(t1.id, TaskStatus::InProgress).await.unwrap();

    let agent1_tasks = fx.tasks.list(TaskFilter { branch_id: Some(fx.branch_id), assignee: Some("agent-1".to_string()), ..Default::default() }).await.unwrap();
    assert_eq!(agent1_tasks.len(), 2);

    let agent2_tasks = fx.tasks.list(TaskFilter { branch_id: Some(fx.branch_id), assignee: Some("agent-2".to_string()), ..Default::default() }).await.unwrap();
    assert_eq!(agent2_tasks.len(), 1);

    let in_progress = fx.tasks.list(TaskFilter { branch_id: Some(fx.branch_id), status: Some(TaskStatus::InProgress), ..Default::default() }).await.unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, t1.id);

    let all_tasks = fx.tasks.list_by_branch(fx.branch_id).await.unwrap();
    assert_eq!(all_tasks.len(), 3);
}

#[tokio::test]
async fn not_found_errors_for_every_mutating_operation() {
    let fx = setup().await;
    let missing = 999_999;

    assert!(fx.tasks.update(missing, orchestrator_core::UpdateTask::default()).await.is_err());
    assert!(fx.tasks.set_status(missing, TaskStatus::InProgress).await.is_err());
    assert!(fx.tasks.complete(missing, "done".to_string(), None, false).await.is_err());
    assert!(fx.tasks.delete(missing).await.is_err());
}

#[tokio::test]
async fn read_and_write_operations_complete_quickly() {
    let fx = setup().await;

    let start = Instant::now();
    let task = fx.tasks.create(new_task(fx.branch_id, "Perf", Some("perf-agent"))).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200), "create took too long against an in-memory database");

    let start = Instant::now();
    fx.tasks.get(task.id).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200), "get took too long against an in-memory database");

    let start = Instant::now();
    fx.tasks.list(TaskFilter::default()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200), "list took too long against an in-memory database");
}

#[tokio::test]
async fn concurrent_task_creation_on_a_shared_pool() {
    let fx = setup().await;
    let branch_id = fx.branch_id;

    let mut handles = Vec::new();
    for i in 0..10 {
        let tasks = fx.tasks.clone();
        handles.push(tokio::spawn(async move { tasks.create(new_task(branch_id, &format!("Concurrent {i}"), None)).await }));
    }

    let mut created = Vec::new();
    for handle in handles {
        created.push(handle.await.unwrap().expect("concurrent create should succeed"));
    }
    assert_eq!(created.len(), 10);

    let mut ids: Vec<_> = created.iter().map(|t| t.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "every concurrently created task should get a unique id");

    let all = fx.tasks.list_by_branch(branch_id).await.unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn repository_stats_reflect_created_entities() {
    let fx = setup().await;

    let t1 = fx.tasks.create(new_task(fx.branch_id, "Stats 1", Some("stats-agent-1"))).await.unwrap();
    let t2 = fx.tasks.create(new_task(fx.branch_id, "Stats 2", Some("stats-agent-2"))).await.unwrap();
    fx.tasks.set_status(t1.id, TaskStatus::InProgress).await.unwrap();
    fx.tasks.complete(t2.id, "done".to_string(), None, false).await.unwrap();

    let stats = fx.health.get_stats().await.unwrap();
    assert_eq!(stats.task_count, 2);
    assert_eq!(stats.project_count, 1);
    assert_eq!(stats.branch_count, 1);
}
