use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{
    Agent, AgentAvailability, AgentBranchAssignment, AgentRepository, NewAgent, OrchestratorError, Result, UpdateAgent,
};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, to_json};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn availability_str(s: AgentAvailability) -> &'static str {
    match s {
        AgentAvailability::Available => "available",
        AgentAvailability::Busy => "busy",
        AgentAvailability::Offline => "offline",
    }
}

fn availability_from_str(s: &str) -> AgentAvailability {
    match s {
        "busy" => AgentAvailability::Busy,
        "offline" => AgentAvailability::Offline,
        _ => AgentAvailability::Available,
    }
}

fn row_to_agent(row: &SqliteRow) -> Result<Agent> {
    let capabilities: String = row.get("capabilities");
    let specializations: String = row.get("specializations");
    Ok(Agent {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        description: row.get("description"),
        call_agent: row.get("call_agent"),
        capabilities: from_json(&capabilities)?,
        specializations: from_json(&specializations)?,
        status: availability_from_str(row.get::<String, _>("status").as_str()),
        max_concurrent_tasks: row.get("max_concurrent_tasks"),
        current_workload: row.get("current_workload"),
        completed_tasks: row.get("completed_tasks"),
        success_rate: row.get("success_rate"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const SELECT_COLUMNS: &str = "id, project_id, name, description, call_agent, capabilities, specializations, status, max_concurrent_tasks, current_workload, completed_tasks, success_rate, created_at, updated_at";

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn register(&self, new_agent: NewAgent) -> Result<Agent> {
        let now = Utc::now();
        let capabilities = to_json(&new_agent.capabilities)?;
        let specializations = to_json(&new_agent.specializations)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO agents (id, project_id, name, description, call_agent, capabilities, specializations, max_concurrent_tasks, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&new_agent.id)
        .bind(new_agent.project_id)
        .bind(&new_agent.name)
        .bind(&new_agent.description)
        .bind(&new_agent.call_agent)
        .bind(&capabilities)
        .bind(&specializations)
        .bind(new_agent.max_concurrent_tasks)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_agent(&row)
    }

    async fn get(&self, project_id: i64, id: &str) -> Result<Option<Agent>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM agents WHERE project_id = ? AND id = ?"))
            .bind(project_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_agent).transpose()
    }

    async fn list(&self, project_id: i64) -> Result<Vec<Agent>> {
        let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM agents WHERE project_id = ? ORDER BY created_at ASC"))
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_agent).collect()
    }

    async fn update(&self, project_id: i64, id: &str, patch: UpdateAgent) -> Result<Agent> {
        let current = self
            .get(project_id, id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("agent", id))?;

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let capabilities = to_json(&patch.capabilities.unwrap_or(current.capabilities))?;
        let specializations = to_json(&patch.specializations.unwrap_or(current.specializations))?;
        let status = patch.status.unwrap_or(current.status);
        let max_concurrent_tasks = patch.max_concurrent_tasks.unwrap_or(current.max_concurrent_tasks);

        let row = sqlx::query(&format!(
            r#"
            UPDATE agents SET name = ?, description = ?, capabilities = ?, specializations = ?, status = ?, max_concurrent_tasks = ?
            WHERE project_id = ? AND id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&name)
        .bind(&description)
        .bind(&capabilities)
        .bind(&specializations)
        .bind(availability_str(status))
        .bind(max_concurrent_tasks)
        .bind(project_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_agent(&row)
    }

    async fn unregister(&self, project_id: i64, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM agents WHERE project_id = ? AND id = ?")
            .bind(project_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn adjust_workload(&self, project_id: i64, id: &str, delta: i32) -> Result<Agent> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE agents SET current_workload = MAX(current_workload + ?, 0)
            WHERE project_id = ? AND id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(delta)
        .bind(project_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found("agent", id))?;

        row_to_agent(&row)
    }

    async fn assign_to_branch(&self, project_id: i64, agent_id: &str, branch_id: i64) -> Result<AgentBranchAssignment> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO agent_branch_assignments (project_id, agent_id, branch_id, assigned_at) VALUES (?, ?, ?, ?) ON CONFLICT (project_id, agent_id, branch_id) DO UPDATE SET assigned_at = excluded.assigned_at",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(branch_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(AgentBranchAssignment { project_id, agent_id: agent_id.to_string(), branch_id, assigned_at: now })
    }

    async fn list_branch_assignments(&self, project_id: i64) -> Result<Vec<AgentBranchAssignment>> {
        let rows = sqlx::query("SELECT project_id, agent_id, branch_id, assigned_at FROM agent_branch_assignments WHERE project_id = ?")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(rows
            .iter()
            .map(|r| AgentBranchAssignment {
                project_id: r.get("project_id"),
                agent_id: r.get("agent_id"),
                branch_id: r.get("branch_id"),
                assigned_at: r.get("assigned_at"),
            })
            .collect())
    }
}
