use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{Branch, BranchRepository, BranchStatus, NewBranch, OrchestratorError, Priority, Result, UpdateBranch};

use crate::common::sqlx_error_to_orchestrator_error;

#[derive(Clone)]
pub struct SqliteBranchRepository {
    pool: SqlitePool,
}

impl SqliteBranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Urgent => "urgent",
        Priority::Critical => "critical",
    }
}

fn priority_from_str(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        "urgent" => Priority::Urgent,
        "critical" => Priority::Critical,
        _ => Priority::Medium,
    }
}

fn branch_status_str(s: BranchStatus) -> &'static str {
    match s {
        BranchStatus::Todo => "todo",
        BranchStatus::Active => "active",
        BranchStatus::Blocked => "blocked",
        BranchStatus::Done => "done",
        BranchStatus::Archived => "archived",
    }
}

fn branch_status_from_str(s: &str) -> BranchStatus {
    match s {
        "active" => BranchStatus::Active,
        "blocked" => BranchStatus::Blocked,
        "done" => BranchStatus::Done,
        "archived" => BranchStatus::Archived,
        _ => BranchStatus::Todo,
    }
}

fn row_to_branch(row: &SqliteRow) -> Branch {
    Branch {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        description: row.get("description"),
        assigned_agent_id: row.get("assigned_agent_id"),
        priority: priority_from_str(row.get::<String, _>("priority").as_str()),
        status: branch_status_from_str(row.get::<String, _>("status").as_str()),
        task_count: row.get("task_count"),
        completed_task_count: row.get("completed_task_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLUMNS: &str = "id, project_id, name, description, assigned_agent_id, priority, status, task_count, completed_task_count, created_at, updated_at";

#[async_trait]
impl BranchRepository for SqliteBranchRepository {
    async fn create(&self, new_branch: NewBranch) -> Result<Branch> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO branches (project_id, name, description, priority, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'todo', ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(new_branch.project_id)
        .bind(&new_branch.name)
        .bind(&new_branch.description)
        .bind(priority_str(new_branch.priority))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(row_to_branch(&row))
    }

    async fn get(&self, id: i64) -> Result<Option<Branch>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM branches WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(row.as_ref().map(row_to_branch))
    }

    async fn get_by_name(&self, project_id: i64, name: &str) -> Result<Option<Branch>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM branches WHERE project_id = ? AND name = ?"
        ))
        .bind(project_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(row.as_ref().map(row_to_branch))
    }

    async fn list(&self, project_id: i64) -> Result<Vec<Branch>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM branches WHERE project_id = ? ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_branch).collect())
    }

    async fn update(&self, id: i64, patch: UpdateBranch) -> Result<Branch> {
        let current = self.get(id).await?.ok_or_else(|| OrchestratorError::not_found("branch", id))?;

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let priority = patch.priority.unwrap_or(current.priority);
        let status = patch.status.unwrap_or(current.status);
        let assigned_agent_id = patch.assigned_agent_id.unwrap_or(current.assigned_agent_id);

        let row = sqlx::query(&format!(
            r#"
            UPDATE branches SET name = ?, description = ?, priority = ?, status = ?, assigned_agent_id = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&name)
        .bind(&description)
        .bind(priority_str(priority))
        .bind(branch_status_str(status))
        .bind(&assigned_agent_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(row_to_branch(&row))
    }

    async fn delete(&self, project_id: i64, id: i64) -> Result<u64> {
        let branch = self.get(id).await?.ok_or_else(|| OrchestratorError::not_found("branch", id))?;
        if branch.project_id != project_id {
            return Err(OrchestratorError::not_found("branch", id));
        }
        if branch.is_protected() {
            return Err(OrchestratorError::forbidden("the 'main' branch cannot be deleted"));
        }

        let deleted_tasks: i64 = sqlx::query("SELECT COUNT(*) AS c FROM tasks WHERE branch_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .get("c");

        sqlx::query("DELETE FROM branches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(deleted_tasks as u64)
    }
}
