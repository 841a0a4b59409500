//! Runs the shared `orchestrator_testkit` repository contract suite
//! against the real SQLite-backed `TaskRepository`, so the same
//! behavioral guarantees the mock provides are verified against the
//! persistence layer that production actually uses.

use database::{SqliteBranchRepository, SqliteProjectRepository, SqliteStore, SqliteTaskRepository};
use orchestrator_core::{BranchRepository, NewBranch, NewProject, Priority, ProjectRepository};
use orchestrator_testkit::test_repository_contract;

/// Seeds a project and enough branches that branch ids `1` and `42` both
/// exist — the contract suite's fixtures default to `branch_id = 1`, but
/// `test_list_contract` exercises a fresh `branch_id = 42` of its own, and
/// the real schema enforces `tasks.branch_id` as a foreign key the mock
/// doesn't.
async fn seed_repository() -> SqliteTaskRepository {
    let store = SqliteStore::new(":memory:").await.expect("store should open");
    store.migrate().await.expect("migrations should apply");

    let projects = SqliteProjectRepository::new(store.pool().clone());
    let project = projects
        .create(NewProject {
            name: "Contract Project".to_string(),
            description: "seeded for the repository contract suite".to_string(),
            user_id: "contract-user".to_string(),
            metadata: serde_json::json!({}),
        })
        .await
        .expect("project should be created");

    let branches = SqliteBranchRepository::new(store.pool().clone());
    for i in 1..=42 {
        branches
            .create(NewBranch {
                project_id: project.id,
                name: format!("contract-branch-{i}"),
                description: "seeded for the repository contract suite".to_string(),
                priority: Priority::Medium,
            })
            .await
            .expect("branch should be created");
    }

    SqliteTaskRepository::new(store.pool().clone())
}

#[tokio::test]
async fn sqlite_task_repository_satisfies_the_contract() {
    let repo = seed_repository().await;
    test_repository_contract(&repo).await;
}
