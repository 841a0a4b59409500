use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{NewProject, Project, ProjectRepository, ProjectStatus, Result, UpdateProject};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, to_json};

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Active => "active",
        ProjectStatus::Archived => "archived",
    }
}

fn status_from_str(s: &str) -> ProjectStatus {
    match s {
        "archived" => ProjectStatus::Archived,
        _ => ProjectStatus::Active,
    }
}

fn row_to_project(row: &SqliteRow) -> Result<Project> {
    let metadata: String = row.get("metadata");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        status: status_from_str(row.get::<String, _>("status").as_str()),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        metadata: from_json(&metadata)?,
    })
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, new_project: NewProject) -> Result<Project> {
        let now = Utc::now();
        let metadata = to_json(&new_project.metadata)?;
        let row = sqlx::query(
            r#"
            INSERT INTO projects (name, description, status, user_id, metadata, created_at, updated_at)
            VALUES (?, ?, 'active', ?, ?, ?, ?)
            RETURNING id, name, description, status, user_id, metadata, created_at, updated_at
            "#,
        )
        .bind(&new_project.name)
        .bind(&new_project.description)
        .bind(&new_project.user_id)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_project(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, description, status, user_id, metadata, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn get_by_name(&self, user_id: &str, name: &str) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, description, status, user_id, metadata, created_at, updated_at FROM projects WHERE user_id = ? AND name = ?",
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<Project>> {
        let rows = match user_id {
            Some(uid) => {
                sqlx::query(
                    "SELECT id, name, description, status, user_id, metadata, created_at, updated_at FROM projects WHERE user_id = ? ORDER BY created_at ASC",
                )
                .bind(uid)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, name, description, status, user_id, metadata, created_at, updated_at FROM projects ORDER BY created_at ASC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_project).collect()
    }

    async fn update(&self, id: i64, patch: UpdateProject) -> Result<Project> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| orchestrator_core::OrchestratorError::not_found("project", id))?;

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let status = patch.status.unwrap_or(current.status);
        let metadata = match patch.metadata {
            Some(m) => to_json(&m)?,
            None => to_json(&current.metadata)?,
        };

        let row = sqlx::query(
            r#"
            UPDATE projects SET name = ?, description = ?, status = ?, metadata = ?
            WHERE id = ?
            RETURNING id, name, description, status, user_id, metadata, created_at, updated_at
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(status_str(status))
        .bind(&metadata)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_project(&row)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn branch_count(&self, id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM branches WHERE project_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(row.get("c"))
    }
}
