use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use orchestrator_core::{NewTask, OrchestratorError, Priority, Result, Task, TaskFilter, TaskRepository, TaskStatus, UpdateTask};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, to_json};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn dependencies_of(&self, task_id: i64) -> Result<BTreeSet<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT depends_on_task_id FROM task_dependencies WHERE task_id = ?
            UNION
            SELECT prerequisite_task_id AS depends_on_task_id FROM project_cross_tree_dependencies WHERE dependent_task_id = ?
            "#,
        )
        .bind(task_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("depends_on_task_id")).collect())
    }

    async fn row_to_task(&self, row: &SqliteRow) -> Result<Task> {
        let assignees: String = row.get("assignees");
        let labels: String = row.get("labels");
        let id: i64 = row.get("id");
        Ok(Task {
            id,
            branch_id: row.get("branch_id"),
            title: row.get("title"),
            description: row.get("description"),
            status: status_from_str(row.get::<String, _>("status").as_str()),
            priority: priority_from_str(row.get::<String, _>("priority").as_str()),
            details: row.get("details"),
            estimated_effort: row.get("estimated_effort"),
            due_date: row.get("due_date"),
            context_id: row.get("context_id"),
            assignees: from_json(&assignees)?,
            labels: from_json(&labels)?,
            dependencies: self.dependencies_of(id).await?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
        })
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

const SELECT_COLUMNS: &str = "id, branch_id, title, description, status, priority, details, estimated_effort, due_date, context_id, assignees, labels, created_at, updated_at, completed_at";

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let assignees = to_json(&new_task.assignees)?;
        let labels = to_json(&new_task.labels)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tasks (branch_id, title, description, status, priority, assignees, labels, due_date, estimated_effort, created_at, updated_at)
            VALUES (?, ?, ?, 'todo', ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(new_task.branch_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(priority_str(new_task.priority))
        .bind(&assignees)
        .bind(&labels)
        .bind(new_task.due_date)
        .bind(new_task.estimated_effort)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        let task_id: i64 = row.get("id");
        for dep in &new_task.dependencies {
            sqlx::query(
                "INSERT INTO task_dependencies (task_id, depends_on_task_id, dep_type, created_at) VALUES (?, ?, 'blocks', ?)",
            )
            .bind(task_id)
            .bind(dep)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        }

        self.row_to_task(&row).await
    }

    async fn get(&self, id: i64) -> Result<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        match row {
            Some(r) => Ok(Some(self.row_to_task(&r).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM tasks"));
        let mut has_conditions = false;

        macro_rules! clause {
            () => {{
                qb.push(if has_conditions { " AND " } else { " WHERE " });
                has_conditions = true;
            }};
        }

        if let Some(branch_id) = filter.branch_id {
            clause!();
            qb.push("branch_id = ").push_bind(branch_id);
        }
        if let Some(status) = filter.status {
            clause!();
            qb.push("status = ").push_bind(status_str(status));
        }
        if let Some(priority) = filter.priority {
            clause!();
            qb.push("priority = ").push_bind(priority_str(priority));
        }
        if let Some(ref label) = filter.label {
            clause!();
            qb.push("labels LIKE ").push_bind(format!("%\"{label}\"%"));
        }
        if let Some(ref assignee) = filter.assignee {
            clause!();
            qb.push("assignees LIKE ").push_bind(format!("%\"{assignee}\"%"));
        }
        if let Some(after) = filter.due_after {
            clause!();
            qb.push("due_date >= ").push_bind(after);
        }
        if let Some(before) = filter.due_before {
            clause!();
            qb.push("due_date <= ").push_bind(before);
        }

        qb.push(" ORDER BY created_at ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(sqlx_error_to_orchestrator_error)?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(self.row_to_task(row).await?);
        }
        Ok(tasks)
    }

    async fn list_by_branch(&self, branch_id: i64) -> Result<Vec<Task>> {
        self.list(TaskFilter { branch_id: Some(branch_id), ..Default::default() }).await
    }

    async fn update(&self, id: i64, patch: UpdateTask) -> Result<Task> {
        let current = self.get(id).await?.ok_or_else(|| OrchestratorError::not_found("task", id))?;

        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.unwrap_or(current.description);
        let status = patch.status.unwrap_or(current.status);
        let priority = patch.priority.unwrap_or(current.priority);
        let details = patch.details.unwrap_or(current.details);
        let estimated_effort = patch.estimated_effort.unwrap_or(current.estimated_effort);
        let due_date = patch.due_date.unwrap_or(current.due_date);
        let assignees = to_json(&patch.assignees.unwrap_or(current.assignees))?;
        let labels = to_json(&patch.labels.unwrap_or(current.labels))?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, details = ?,
                estimated_effort = ?, due_date = ?, assignees = ?, labels = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&title)
        .bind(&description)
        .bind(status_str(status))
        .bind(priority_str(priority))
        .bind(&details)
        .bind(estimated_effort)
        .bind(due_date)
        .bind(&assignees)
        .bind(&labels)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        if let Some(dependencies) = patch.dependencies {
            sqlx::query("DELETE FROM task_dependencies WHERE task_id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(sqlx_error_to_orchestrator_error)?;
            let now = Utc::now();
            for dep in &dependencies {
                sqlx::query(
                    "INSERT INTO task_dependencies (task_id, depends_on_task_id, dep_type, created_at) VALUES (?, ?, 'blocks', ?)",
                )
                .bind(id)
                .bind(dep)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(sqlx_error_to_orchestrator_error)?;
            }
        }

        self.row_to_task(&row).await
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<Task> {
        let row = sqlx::query(&format!("UPDATE tasks SET status = ? WHERE id = ? RETURNING {SELECT_COLUMNS}"))
            .bind(status_str(status))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        self.row_to_task(&row).await
    }

    async fn complete(&self, id: i64, completion_summary: String, testing_notes: Option<String>, force: bool) -> Result<Task> {
        let task = self.get(id).await?.ok_or_else(|| OrchestratorError::not_found("task", id))?;

        for dep_id in &task.dependencies {
            let dep = self.get(*dep_id).await?;
            if let Some(dep) = dep {
                if dep.status != TaskStatus::Done {
                    return Err(OrchestratorError::conflict(format!(
                        "task {id} cannot complete: dependency {dep_id} is not done"
                    )));
                }
            }
        }

        if !force {
            let open_subtasks: i64 = sqlx::query("SELECT COUNT(*) AS c FROM subtasks WHERE task_id = ? AND status != 'done'")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(sqlx_error_to_orchestrator_error)?
                .get("c");
            if open_subtasks > 0 {
                return Err(OrchestratorError::conflict(format!(
                    "task {id} has {open_subtasks} incomplete subtasks; pass force=true to override"
                )));
            }
        }

        let now = Utc::now();
        let details = match testing_notes {
            Some(notes) => format!("{}\n\n[testing notes]\n{notes}", task.details),
            None => task.details,
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks SET status = 'done', details = ?, completed_at = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&details)
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        let _ = completion_summary; // persisted as a task-tier insight by the dispatch handler, not a task column
        self.row_to_task(&row).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
