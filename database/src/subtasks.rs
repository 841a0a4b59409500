use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{NewSubtask, OrchestratorError, Priority, Result, Subtask, SubtaskRepository, TaskStatus, UpdateSubtask};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, to_json};

#[derive(Clone)]
pub struct SqliteSubtaskRepository {
    pool: SqlitePool,
}

impl SqliteSubtaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Review => "review",
        TaskStatus::Testing => "testing",
        TaskStatus::Done => "done",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Cancelled => "cancelled",
        TaskStatus::Archived => "archived",
    }
}

fn status_from_str(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "review" => TaskStatus::Review,
        "testing" => TaskStatus::Testing,
        "done" => TaskStatus::Done,
        "blocked" => TaskStatus::Blocked,
        "cancelled" => TaskStatus::Cancelled,
        "archived" => TaskStatus::Archived,
        _ => TaskStatus::Todo,
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

fn row_to_subtask(row: &SqliteRow) -> Result<Subtask> {
    let assignees: String = row.get("assignees");
    let insights_found: String = row.get("insights_found");
    Ok(Subtask {
        id: row.get("id"),
        task_id: row.get("task_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: status_from_str(row.get::<String, _>("status").as_str()),
        priority: priority_from_str(row.get::<String, _>("priority").as_str()),
        assignees: from_json(&assignees)?,
        estimated_effort: row.get("estimated_effort"),
        progress_percentage: row.get("progress_percentage"),
        progress_notes: row.get("progress_notes"),
        blockers: row.get("blockers"),
        completion_summary: row.get("completion_summary"),
        impact_on_parent: row.get("impact_on_parent"),
        insights_found: from_json(&insights_found)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
    })
}

const SELECT_COLUMNS: &str = "id, task_id, title, description, status, priority, assignees, estimated_effort, progress_percentage, progress_notes, blockers, completion_summary, impact_on_parent, insights_found, created_at, updated_at, completed_at";

#[async_trait]
impl SubtaskRepository for SqliteSubtaskRepository {
    async fn create(&self, new_subtask: NewSubtask) -> Result<Subtask> {
        let now = Utc::now();
        let assignees = to_json(&new_subtask.assignees)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subtasks (task_id, title, description, status, priority, assignees, estimated_effort, created_at, updated_at)
            VALUES (?, ?, ?, 'todo', ?, ?, ?, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(new_subtask.task_id)
        .bind(&new_subtask.title)
        .bind(&new_subtask.description)
        .bind(priority_str(new_subtask.priority))
        .bind(&assignees)
        .bind(new_subtask.estimated_effort)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_subtask(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Subtask>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM subtasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_subtask).transpose()
    }

    async fn list_by_task(&self, task_id: i64) -> Result<Vec<Subtask>> {
        let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM subtasks WHERE task_id = ? ORDER BY created_at ASC"))
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_subtask).collect()
    }

    async fn update(&self, id: i64, patch: UpdateSubtask) -> Result<Subtask> {
        let current = self.get(id).await?.ok_or_else(|| OrchestratorError::not_found("subtask", id))?;

        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.unwrap_or(current.description);
        let status = patch.status.unwrap_or(current.status);
        let priority = patch.priority.unwrap_or(current.priority);
        let assignees = to_json(&patch.assignees.unwrap_or(current.assignees))?;
        let estimated_effort = patch.estimated_effort.unwrap_or(current.estimated_effort);
        let progress_percentage = patch.progress_percentage.unwrap_or(current.progress_percentage);
        let progress_notes = patch.progress_notes.unwrap_or(current.progress_notes);
        let blockers = patch.blockers.unwrap_or(current.blockers);
        let impact_on_parent = patch.impact_on_parent.or(current.impact_on_parent);
        let insights_found = to_json(&patch.insights_found.unwrap_or(current.insights_found))?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE subtasks SET title = ?, description = ?, status = ?, priority = ?, assignees = ?,
                estimated_effort = ?, progress_percentage = ?, progress_notes = ?, blockers = ?,
                impact_on_parent = ?, insights_found = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&title)
        .bind(&description)
        .bind(status_str(status))
        .bind(priority_str(priority))
        .bind(&assignees)
        .bind(estimated_effort)
        .bind(progress_percentage)
        .bind(&progress_notes)
        .bind(&blockers)
        .bind(&impact_on_parent)
        .bind(&insights_found)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_subtask(&row)
    }

    async fn complete(&self, id: i64, completion_summary: String) -> Result<Subtask> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            UPDATE subtasks SET status = 'done', progress_percentage = 100.0, completion_summary = ?, completed_at = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&completion_summary)
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_subtask(&row)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
