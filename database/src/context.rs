//! SQLite-backed repositories for the four context tiers (C2).
//!
//! Each tier's own row stores its `data`/override blob as JSON with a
//! `version` column for optimistic locking, the pattern this crate's
//! predecessor used for its single workspace-context table, generalized to
//! four tiers.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{
    BranchContext, BranchContextRepository, ContextPatch, GlobalContext, GlobalContextRepository, OrchestratorError,
    ProjectContext, ProjectContextRepository, Result, TaskContext, TaskContextRepository,
};

use crate::common::{from_json, merge_json_shallow, sqlx_error_to_orchestrator_error, to_json};

fn check_version(current_version: i64, expected_version: Option<i64>) -> Result<()> {
    match expected_version {
        Some(expected) if expected != current_version => Err(OrchestratorError::version_conflict(format!(
            "expected version {expected}, found {current_version}"
        ))),
        _ => Ok(()),
    }
}

// --- Global ---

#[derive(Clone)]
pub struct SqliteGlobalContextRepository {
    pool: SqlitePool,
}

impl SqliteGlobalContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_global(row: &SqliteRow) -> Result<GlobalContext> {
    let data: String = row.get("data");
    let delegation_rules: String = row.get("delegation_rules");
    Ok(GlobalContext {
        data: from_json(&data)?,
        delegation_rules: from_json(&delegation_rules)?,
        inheritance_disabled: row.get::<i64, _>("inheritance_disabled") != 0,
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl GlobalContextRepository for SqliteGlobalContextRepository {
    async fn get(&self) -> Result<Option<GlobalContext>> {
        let row = sqlx::query("SELECT data, delegation_rules, inheritance_disabled, version, created_at, updated_at FROM global_context WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_global).transpose()
    }

    async fn upsert(&self, patch: ContextPatch, expected_version: Option<i64>) -> Result<GlobalContext> {
        let now = Utc::now();
        let current = self.get().await?;

        let (data, inheritance_disabled, version) = match &current {
            Some(c) => {
                check_version(c.version, expected_version)?;
                let data = match &patch.data {
                    Some(d) => merge_json_shallow(&c.data, d),
                    None => c.data.clone(),
                };
                (data, patch.inheritance_disabled.unwrap_or(c.inheritance_disabled), c.version + 1)
            }
            None => (patch.data.unwrap_or(Value::Object(Default::default())), patch.inheritance_disabled.unwrap_or(false), 1),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO global_context (id, data, delegation_rules, inheritance_disabled, version, created_at, updated_at)
            VALUES (1, ?, '{}', ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET data = excluded.data, inheritance_disabled = excluded.inheritance_disabled,
                version = excluded.version, updated_at = excluded.updated_at
            RETURNING data, delegation_rules, inheritance_disabled, version, created_at, updated_at
            "#,
        )
        .bind(to_json(&data)?)
        .bind(inheritance_disabled as i64)
        .bind(version)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_global(&row)
    }
}

// --- Project ---

#[derive(Clone)]
pub struct SqliteProjectContextRepository {
    pool: SqlitePool,
}

impl SqliteProjectContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_project_context(row: &SqliteRow) -> Result<ProjectContext> {
    let data: String = row.get("data");
    let global_overrides: String = row.get("global_overrides");
    let delegation_rules: String = row.get("delegation_rules");
    Ok(ProjectContext {
        project_id: row.get("project_id"),
        data: from_json(&data)?,
        global_overrides: from_json(&global_overrides)?,
        delegation_rules: from_json(&delegation_rules)?,
        inheritance_disabled: row.get::<i64, _>("inheritance_disabled") != 0,
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl ProjectContextRepository for SqliteProjectContextRepository {
    async fn get(&self, project_id: i64) -> Result<Option<ProjectContext>> {
        let row = sqlx::query(
            "SELECT project_id, data, global_overrides, delegation_rules, inheritance_disabled, version, created_at, updated_at FROM project_contexts WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_project_context).transpose()
    }

    async fn upsert(&self, project_id: i64, patch: ContextPatch, expected_version: Option<i64>) -> Result<ProjectContext> {
        let now = Utc::now();
        let current = self.get(project_id).await?;

        let (data, global_overrides, inheritance_disabled, version) = match &current {
            Some(c) => {
                check_version(c.version, expected_version)?;
                let data = match &patch.data {
                    Some(d) => merge_json_shallow(&c.data, d),
                    None => c.data.clone(),
                };
                let overrides = match &patch.overrides {
                    Some(o) => merge_json_shallow(&c.global_overrides, o),
                    None => c.global_overrides.clone(),
                };
                (data, overrides, patch.inheritance_disabled.unwrap_or(c.inheritance_disabled), c.version + 1)
            }
            None => (
                patch.data.unwrap_or(Value::Object(Default::default())),
                patch.overrides.unwrap_or(Value::Object(Default::default())),
                patch.inheritance_disabled.unwrap_or(false),
                1,
            ),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO project_contexts (project_id, data, global_overrides, delegation_rules, inheritance_disabled, version, created_at, updated_at)
            VALUES (?, ?, ?, '{}', ?, ?, ?, ?)
            ON CONFLICT (project_id) DO UPDATE SET data = excluded.data, global_overrides = excluded.global_overrides,
                inheritance_disabled = excluded.inheritance_disabled, version = excluded.version, updated_at = excluded.updated_at
            RETURNING project_id, data, global_overrides, delegation_rules, inheritance_disabled, version, created_at, updated_at
            "#,
        )
        .bind(project_id)
        .bind(to_json(&data)?)
        .bind(to_json(&global_overrides)?)
        .bind(inheritance_disabled as i64)
        .bind(version)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_project_context(&row)
    }
}

// --- Branch ---

#[derive(Clone)]
pub struct SqliteBranchContextRepository {
    pool: SqlitePool,
}

impl SqliteBranchContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_branch_context(row: &SqliteRow) -> Result<BranchContext> {
    let data: String = row.get("data");
    let local_overrides: String = row.get("local_overrides");
    Ok(BranchContext {
        branch_id: row.get("branch_id"),
        parent_project_id: row.get("parent_project_id"),
        data: from_json(&data)?,
        local_overrides: from_json(&local_overrides)?,
        inheritance_disabled: row.get::<i64, _>("inheritance_disabled") != 0,
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl BranchContextRepository for SqliteBranchContextRepository {
    async fn get(&self, branch_id: i64) -> Result<Option<BranchContext>> {
        let row = sqlx::query(
            "SELECT branch_id, parent_project_id, data, local_overrides, inheritance_disabled, version, created_at, updated_at FROM branch_contexts WHERE branch_id = ?",
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_branch_context).transpose()
    }

    async fn upsert(
        &self,
        branch_id: i64,
        parent_project_id: i64,
        patch: ContextPatch,
        expected_version: Option<i64>,
    ) -> Result<BranchContext> {
        let now = Utc::now();
        let current = self.get(branch_id).await?;

        let (data, local_overrides, inheritance_disabled, version) = match &current {
            Some(c) => {
                check_version(c.version, expected_version)?;
                let data = match &patch.data {
                    Some(d) => merge_json_shallow(&c.data, d),
                    None => c.data.clone(),
                };
                let overrides = match &patch.overrides {
                    Some(o) => merge_json_shallow(&c.local_overrides, o),
                    None => c.local_overrides.clone(),
                };
                (data, overrides, patch.inheritance_disabled.unwrap_or(c.inheritance_disabled), c.version + 1)
            }
            None => (
                patch.data.unwrap_or(Value::Object(Default::default())),
                patch.overrides.unwrap_or(Value::Object(Default::default())),
                patch.inheritance_disabled.unwrap_or(false),
                1,
            ),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO branch_contexts (branch_id, parent_project_id, data, local_overrides, inheritance_disabled, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (branch_id) DO UPDATE SET data = excluded.data, local_overrides = excluded.local_overrides,
                inheritance_disabled = excluded.inheritance_disabled, version = excluded.version, updated_at = excluded.updated_at
            RETURNING branch_id, parent_project_id, data, local_overrides, inheritance_disabled, version, created_at, updated_at
            "#,
        )
        .bind(branch_id)
        .bind(parent_project_id)
        .bind(to_json(&data)?)
        .bind(to_json(&local_overrides)?)
        .bind(inheritance_disabled as i64)
        .bind(version)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_branch_context(&row)
    }
}

// --- Task ---

#[derive(Clone)]
pub struct SqliteTaskContextRepository {
    pool: SqlitePool,
}

impl SqliteTaskContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const TASK_CONTEXT_COLUMNS: &str = "task_id, parent_project_id, task_data, local_overrides, implementation_notes, delegation_triggers, inheritance_disabled, force_local_only, resolved_context, dependencies_hash, version, created_at, updated_at";

fn row_to_task_context(row: &SqliteRow) -> Result<TaskContext> {
    let task_data: String = row.get("task_data");
    let local_overrides: String = row.get("local_overrides");
    let delegation_triggers: String = row.get("delegation_triggers");
    let resolved_context: Option<String> = row.get("resolved_context");
    Ok(TaskContext {
        task_id: row.get("task_id"),
        parent_project_id: row.get("parent_project_id"),
        task_data: from_json(&task_data)?,
        local_overrides: from_json(&local_overrides)?,
        implementation_notes: row.get("implementation_notes"),
        delegation_triggers: from_json(&delegation_triggers)?,
        inheritance_disabled: row.get::<i64, _>("inheritance_disabled") != 0,
        force_local_only: row.get::<i64, _>("force_local_only") != 0,
        resolved_context: resolved_context.map(|s| from_json(&s)).transpose()?,
        dependencies_hash: row.get("dependencies_hash"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl TaskContextRepository for SqliteTaskContextRepository {
    async fn get(&self, task_id: i64) -> Result<Option<TaskContext>> {
        let row = sqlx::query(&format!("SELECT {TASK_CONTEXT_COLUMNS} FROM task_contexts WHERE task_id = ?"))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_task_context).transpose()
    }

    async fn upsert(
        &self,
        task_id: i64,
        parent_project_id: i64,
        patch: ContextPatch,
        expected_version: Option<i64>,
    ) -> Result<TaskContext> {
        let now = Utc::now();
        let current = self.get(task_id).await?;

        let (task_data, local_overrides, inheritance_disabled, force_local_only, version) = match &current {
            Some(c) => {
                check_version(c.version, expected_version)?;
                let data = match &patch.data {
                    Some(d) => merge_json_shallow(&c.task_data, d),
                    None => c.task_data.clone(),
                };
                let overrides = match &patch.overrides {
                    Some(o) => merge_json_shallow(&c.local_overrides, o),
                    None => c.local_overrides.clone(),
                };
                (
                    data,
                    overrides,
                    patch.inheritance_disabled.unwrap_or(c.inheritance_disabled),
                    patch.force_local_only.unwrap_or(c.force_local_only),
                    c.version + 1,
                )
            }
            None => (
                patch.data.unwrap_or(Value::Object(Default::default())),
                patch.overrides.unwrap_or(Value::Object(Default::default())),
                patch.inheritance_disabled.unwrap_or(false),
                patch.force_local_only.unwrap_or(false),
                1,
            ),
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO task_contexts (task_id, parent_project_id, task_data, local_overrides, inheritance_disabled, force_local_only, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (task_id) DO UPDATE SET task_data = excluded.task_data, local_overrides = excluded.local_overrides,
                inheritance_disabled = excluded.inheritance_disabled, force_local_only = excluded.force_local_only,
                version = excluded.version, updated_at = excluded.updated_at
            RETURNING {TASK_CONTEXT_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(parent_project_id)
        .bind(to_json(&task_data)?)
        .bind(to_json(&local_overrides)?)
        .bind(inheritance_disabled as i64)
        .bind(force_local_only as i64)
        .bind(version)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_task_context(&row)
    }

    async fn store_resolved(&self, task_id: i64, resolved_context: Value, dependencies_hash: String) -> Result<()> {
        // No-ops if the task has never had its own task_contexts row created;
        // the resolved value still lives in the inheritance_cache table via
        // `CacheRepository::put`, so this is a denormalized convenience copy.
        sqlx::query("UPDATE task_contexts SET resolved_context = ?, dependencies_hash = ? WHERE task_id = ?")
            .bind(to_json(&resolved_context)?)
            .bind(&dependencies_hash)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
