use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use database::{
    SqliteAgentRepository, SqliteBranchContextRepository, SqliteBranchRepository, SqliteCacheRepository,
    SqliteConflictRepository, SqliteDelegationRepository, SqliteDependencyRepository, SqliteGlobalContextRepository,
    SqliteHandoffRepository, SqliteHealthRepository, SqliteInsightRepository, SqliteMessageRepository,
    SqliteProjectContextRepository, SqliteProjectRepository, SqliteStore, SqliteSubtaskRepository,
    SqliteTaskContextRepository, SqliteTaskRepository,
};
use orchestrator_context::cache::CacheConfig;
use orchestrator_context::ContextEngine;
use orchestrator_coordinator::Coordinator;
use orchestrator_scheduler::Scheduler;

use crate::config::Config;
use crate::dispatch::Facade;

/// Opens the store, runs migrations, and wires every repository into the
/// engine/scheduler/coordinator/facade stack described by the config.
pub async fn initialize_app(config: &Config) -> Result<Arc<Facade>> {
    info!("opening database at {}", config.database_url());
    let store = SqliteStore::new(&config.database_url()).await.context("failed to open database")?;
    store.migrate().await.context("failed to run database migrations")?;
    let pool = store.pool().clone();

    let projects = Arc::new(SqliteProjectRepository::new(pool.clone()));
    let branches = Arc::new(SqliteBranchRepository::new(pool.clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let subtasks = Arc::new(SqliteSubtaskRepository::new(pool.clone()));
    let dependencies = Arc::new(SqliteDependencyRepository::new(pool.clone()));
    let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let global_contexts = Arc::new(SqliteGlobalContextRepository::new(pool.clone()));
    let project_contexts = Arc::new(SqliteProjectContextRepository::new(pool.clone()));
    let branch_contexts = Arc::new(SqliteBranchContextRepository::new(pool.clone()));
    let task_contexts = Arc::new(SqliteTaskContextRepository::new(pool.clone()));
    let cache = Arc::new(SqliteCacheRepository::new(pool.clone()));
    let delegations = Arc::new(SqliteDelegationRepository::new(pool.clone()));
    let insights = Arc::new(SqliteInsightRepository::new(pool.clone()));
    let handoffs = Arc::new(SqliteHandoffRepository::new(pool.clone()));
    let conflicts = Arc::new(SqliteConflictRepository::new(pool.clone()));
    let messages = Arc::new(SqliteMessageRepository::new(pool.clone()));
    let health = Arc::new(SqliteHealthRepository::new(pool.clone()));

    let cache_config = CacheConfig { ttl_seconds: config.context.cache_ttl_seconds as i64, max_entries: config.context.max_cache_entries };

    let (delegation_tx, delegation_rx) = mpsc::channel(config.context.delegation_worker_parallelism * 4);

    let context = ContextEngine::new(
        global_contexts,
        project_contexts,
        branch_contexts,
        task_contexts,
        cache,
        projects.clone(),
        branches.clone(),
        tasks.clone(),
        delegations.clone(),
        insights,
        cache_config,
    )
    .with_delegation_queue(delegation_tx);
    let context = Arc::new(context);

    orchestrator_context::delegation::spawn_with_queue(context.clone(), delegation_rx);

    let scheduler = Arc::new(Scheduler::new(tasks.clone(), branches.clone(), dependencies.clone(), Some(context.clone())));

    let coordinator = Arc::new(Coordinator::new(
        agents.clone(),
        branches.clone(),
        tasks.clone(),
        handoffs,
        conflicts.clone(),
        messages,
        context.clone(),
    ));

    let facade = Arc::new(Facade::new(
        projects,
        branches,
        tasks,
        subtasks,
        dependencies,
        agents,
        conflicts,
        health,
        context,
        scheduler,
        coordinator,
        config.scheduler.reopen_grace_seconds,
    ));

    info!("application initialized");
    Ok(facade)
}

/// Ensures the parent directory of a `sqlite://` database URL exists.
pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.exists() {
                info!("creating database directory: {}", parent.display());
                std::fs::create_dir_all(parent).context("failed to create database directory")?;
            }
        }
    }
    Ok(())
}

pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initializes_against_an_in_memory_database() {
        let mut config = Config::default();
        config.database.url = Some("sqlite::memory:".to_string());
        let facade = initialize_app(&config).await;
        assert!(facade.is_ok());
    }

    #[tokio::test]
    async fn health_check_reports_healthy_on_a_fresh_database() {
        let mut config = Config::default();
        config.database.url = Some("sqlite::memory:".to_string());
        let facade = initialize_app(&config).await.unwrap();
        let envelope = facade.dispatch("manage_connection", "health_check", serde_json::json!({})).await;
        assert!(envelope.success);
    }

    #[test]
    fn test_ensure_database_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("subdir").join("test.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let result = ensure_database_directory(&database_url);
        assert!(result.is_ok());
        assert!(db_path.parent().unwrap().exists());
    }
}
