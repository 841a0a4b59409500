use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use orchestrator_core::{HealthRepository, RepositoryStats, Result};

use crate::common::sqlx_error_to_orchestrator_error;

#[derive(Clone)]
pub struct SqliteHealthRepository {
    pool: SqlitePool,
}

impl SqliteHealthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthRepository for SqliteHealthRepository {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<RepositoryStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM projects) AS project_count,
                (SELECT COUNT(*) FROM branches) AS branch_count,
                (SELECT COUNT(*) FROM tasks) AS task_count,
                (SELECT COUNT(*) FROM agents) AS agent_count,
                (SELECT COUNT(*) FROM inheritance_cache) AS cache_entry_count
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(RepositoryStats {
            project_count: row.get("project_count"),
            branch_count: row.get("branch_count"),
            task_count: row.get("task_count"),
            agent_count: row.get("agent_count"),
            cache_entry_count: row.get("cache_entry_count"),
        })
    }
}
