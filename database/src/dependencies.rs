use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::dependency_graph::would_create_cycle;
use orchestrator_core::{DependencyEdge, DependencyRepository, DependencyType, OrchestratorError, Result};

use crate::common::sqlx_error_to_orchestrator_error;

#[derive(Clone)]
pub struct SqliteDependencyRepository {
    pool: SqlitePool,
}

impl SqliteDependencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn project_edges(&self, project_id: i64) -> Result<HashMap<i64, HashSet<i64>>> {
        let rows = sqlx::query(
            r#"
            SELECT d.task_id, d.depends_on_task_id
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.task_id
            JOIN branches b ON b.id = t.branch_id
            WHERE b.project_id = ? AND d.dep_type = 'blocks'
            UNION ALL
            SELECT c.dependent_task_id AS task_id, c.prerequisite_task_id AS depends_on_task_id
            FROM project_cross_tree_dependencies c
            JOIN tasks t ON t.id = c.dependent_task_id
            JOIN branches b ON b.id = t.branch_id
            WHERE b.project_id = ? AND c.dep_type = 'blocks'
            "#,
        )
        .bind(project_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        let mut edges: HashMap<i64, HashSet<i64>> = HashMap::new();
        for row in &rows {
            edges.entry(row.get("task_id")).or_default().insert(row.get("depends_on_task_id"));
        }
        Ok(edges)
    }

    async fn project_of_task(&self, task_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT b.project_id AS project_id FROM tasks t JOIN branches b ON b.id = t.branch_id WHERE t.id = ?",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found("task", task_id))?;
        Ok(row.get("project_id"))
    }
}

fn dep_type_str(t: DependencyType) -> &'static str {
    match t {
        DependencyType::Blocks => "blocks",
        DependencyType::Related => "related",
    }
}

fn dep_type_from_str(s: &str) -> DependencyType {
    match s {
        "related" => DependencyType::Related,
        _ => DependencyType::Blocks,
    }
}

fn row_to_edge(row: &SqliteRow) -> DependencyEdge {
    DependencyEdge {
        task_id: row.get("task_id"),
        depends_on_task_id: row.get("depends_on_task_id"),
        dep_type: dep_type_from_str(row.get::<String, _>("dep_type").as_str()),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl DependencyRepository for SqliteDependencyRepository {
    async fn add(&self, task_id: i64, depends_on: i64, dep_type: DependencyType) -> Result<()> {
        if dep_type == DependencyType::Blocks {
            let project_id = self.project_of_task(task_id).await?;
            let edges = self.project_edges(project_id).await?;
            if would_create_cycle(&edges, task_id, depends_on) {
                return Err(OrchestratorError::cycle(format!(
                    "adding dependency {task_id} -> {depends_on} would create a cycle"
                )));
            }
        }

        sqlx::query(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, dep_type, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(depends_on)
        .bind(dep_type_str(dep_type))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn remove(&self, task_id: i64, depends_on: i64) -> Result<()> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_task_id = ?")
            .bind(task_id)
            .bind(depends_on)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        // The pair can only ever exist in one of the two tables, depending on
        // whether it was created same-branch or cross-branch; clearing both
        // spares the caller from having to know which.
        sqlx::query("DELETE FROM project_cross_tree_dependencies WHERE dependent_task_id = ? AND prerequisite_task_id = ?")
            .bind(task_id)
            .bind(depends_on)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn list_for_project(&self, project_id: i64) -> Result<Vec<DependencyEdge>> {
        let rows = sqlx::query(
            r#"
            SELECT d.task_id, d.depends_on_task_id, d.dep_type, d.created_at
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.task_id
            JOIN branches b ON b.id = t.branch_id
            WHERE b.project_id = ?
            UNION ALL
            SELECT c.dependent_task_id AS task_id, c.prerequisite_task_id AS depends_on_task_id, c.dep_type, c.created_at
            FROM project_cross_tree_dependencies c
            JOIN tasks t ON t.id = c.dependent_task_id
            JOIN branches b ON b.id = t.branch_id
            WHERE b.project_id = ?
            "#,
        )
        .bind(project_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_edge).collect())
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<DependencyEdge>> {
        let rows = sqlx::query(
            r#"
            SELECT task_id, depends_on_task_id, dep_type, created_at FROM task_dependencies WHERE task_id = ?
            UNION ALL
            SELECT dependent_task_id AS task_id, prerequisite_task_id AS depends_on_task_id, dep_type, created_at
            FROM project_cross_tree_dependencies WHERE dependent_task_id = ?
            "#,
        )
        .bind(task_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_edge).collect())
    }

    async fn dependents_of(&self, task_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT task_id FROM task_dependencies WHERE depends_on_task_id = ?
            UNION ALL
            SELECT dependent_task_id AS task_id FROM project_cross_tree_dependencies WHERE prerequisite_task_id = ?
            "#,
        )
        .bind(task_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(|r| r.get("task_id")).collect())
    }

    async fn add_cross_branch(&self, dependent_task_id: i64, prerequisite_task_id: i64, dep_type: DependencyType) -> Result<()> {
        if dep_type == DependencyType::Blocks {
            let project_id = self.project_of_task(dependent_task_id).await?;
            let edges = self.project_edges(project_id).await?;
            if would_create_cycle(&edges, dependent_task_id, prerequisite_task_id) {
                return Err(OrchestratorError::cycle(format!(
                    "adding cross-branch dependency {dependent_task_id} -> {prerequisite_task_id} would create a cycle"
                )));
            }
        }

        sqlx::query(
            "INSERT INTO project_cross_tree_dependencies (dependent_task_id, prerequisite_task_id, dep_type, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(dependent_task_id)
        .bind(prerequisite_task_id)
        .bind(dep_type_str(dep_type))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
