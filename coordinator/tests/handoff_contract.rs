//! Exercises the `Coordinator` handoff contract (C5) end to end against the
//! real SQLite repositories: the async methods here write through
//! `HandoffRepository` and `ContextEngine` and, unlike the pure helpers in
//! `src/handoff.rs`, were previously never driven by any test.

use std::sync::Arc;

use database::{
    SqliteAgentRepository, SqliteBranchContextRepository, SqliteBranchRepository, SqliteCacheRepository,
    SqliteConflictRepository, SqliteDelegationRepository, SqliteGlobalContextRepository, SqliteHandoffRepository,
    SqliteInsightRepository, SqliteMessageRepository, SqliteProjectContextRepository, SqliteProjectRepository,
    SqliteStore, SqliteTaskContextRepository, SqliteTaskRepository,
};
use orchestrator_context::cache::CacheConfig;
use orchestrator_context::ContextEngine;
use orchestrator_coordinator::Coordinator;
use orchestrator_core::{BranchRepository, NewBranch, NewProject, NewTask, Priority, ProjectRepository, TaskRepository};

async fn setup() -> (Coordinator, Arc<ContextEngine>, i64) {
    let store = SqliteStore::new(":memory:").await.expect("store should open");
    store.migrate().await.expect("migrations should apply");
    let pool = store.pool().clone();

    let projects = Arc::new(SqliteProjectRepository::new(pool.clone()));
    let branches = Arc::new(SqliteBranchRepository::new(pool.clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let handoffs = Arc::new(SqliteHandoffRepository::new(pool.clone()));
    let conflicts = Arc::new(SqliteConflictRepository::new(pool.clone()));
    let messages = Arc::new(SqliteMessageRepository::new(pool.clone()));

    let context = Arc::new(ContextEngine::new(
        Arc::new(SqliteGlobalContextRepository::new(pool.clone())),
        Arc::new(SqliteProjectContextRepository::new(pool.clone())),
        Arc::new(SqliteBranchContextRepository::new(pool.clone())),
        Arc::new(SqliteTaskContextRepository::new(pool.clone())),
        Arc::new(SqliteCacheRepository::new(pool.clone())),
        projects.clone(),
        branches.clone(),
        tasks.clone(),
        Arc::new(SqliteDelegationRepository::new(pool.clone())),
        Arc::new(SqliteInsightRepository::new(pool.clone())),
        CacheConfig::default(),
    ));

    let project = projects
        .create(NewProject {
            name: "Handoff Project".to_string(),
            description: "seeded for the coordinator handoff contract test".to_string(),
            user_id: "contract-user".to_string(),
            metadata: serde_json::json!({}),
        })
        .await
        .expect("project should be created");

    let branch = branches
        .create(NewBranch { project_id: project.id, name: "main".to_string(), description: "seed branch".to_string(), priority: Priority::Medium })
        .await
        .expect("branch should be created");

    let task = tasks
        .create(NewTask {
            branch_id: branch.id,
            title: "Wire up the thing".to_string(),
            description: "seeded task for the handoff contract test".to_string(),
            priority: Priority::Medium,
            assignees: Default::default(),
            labels: Default::default(),
            dependencies: Default::default(),
            due_date: None,
            estimated_effort: None,
        })
        .await
        .expect("task should be created");

    let coordinator = Coordinator::new(agents, branches, tasks, handoffs, conflicts, messages, context.clone());
    (coordinator, context, task.id)
}

#[tokio::test]
async fn completing_a_handoff_records_a_task_insight() {
    let (coordinator, context, task_id) = setup().await;

    let handoff = coordinator
        .open_handoff(task_id, "agent-a".to_string(), "agent-b".to_string(), "going offline".to_string(), serde_json::json!({"progress": "half done"}))
        .await
        .expect("opening a handoff should succeed");
    assert_eq!(handoff.status, orchestrator_core::HandoffStatus::Pending);

    let accepted = coordinator.accept_handoff(handoff.id).await.expect("accepting a pending handoff should succeed");
    assert_eq!(accepted.status, orchestrator_core::HandoffStatus::Accepted);

    let completed = coordinator.complete_handoff(handoff.id, "agent-b".to_string()).await.expect("completing an accepted handoff should succeed");
    assert_eq!(completed.status, orchestrator_core::HandoffStatus::Completed);

    let insights = context.insights().list(orchestrator_core::Tier::Task(task_id)).await.expect("listing insights should succeed");
    assert!(
        insights.iter().any(|i| i.category == "handoff" && i.content.contains("agent-a") && i.content.contains("agent-b")),
        "completing a handoff should leave a task-tier insight recording it: {insights:?}"
    );
}

#[tokio::test]
async fn rejecting_a_pending_handoff_does_not_record_an_insight() {
    let (coordinator, context, task_id) = setup().await;

    let handoff = coordinator
        .open_handoff(task_id, "agent-a".to_string(), "agent-b".to_string(), "wrong specialization".to_string(), serde_json::json!({}))
        .await
        .expect("opening a handoff should succeed");

    let rejected = coordinator.reject_handoff(handoff.id).await.expect("rejecting a pending handoff should succeed");
    assert_eq!(rejected.status, orchestrator_core::HandoffStatus::Rejected);

    let insights = context.insights().list(orchestrator_core::Tier::Task(task_id)).await.expect("listing insights should succeed");
    assert!(insights.iter().all(|i| i.category != "handoff"), "a rejected handoff should not produce a completion insight");

    // A rejected handoff is terminal; completing it should be refused.
    let err = coordinator.complete_handoff(handoff.id, "agent-b".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), orchestrator_core::ErrorKind::Conflict);
}
