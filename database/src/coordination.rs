//! SQLite repositories for Agent Coordinator (C5) records: handoffs,
//! conflicts, and inter-agent messages.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{
    AgentCommunication, ConflictRecord, ConflictRepository, HandoffRepository, HandoffStatus, MessageRepository,
    OrchestratorError, Priority, Result, WorkHandoff,
};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, to_json};

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

// --- Handoffs ---

fn handoff_status_str(s: HandoffStatus) -> &'static str {
    match s {
        HandoffStatus::Pending => "pending",
        HandoffStatus::Accepted => "accepted",
        HandoffStatus::Completed => "completed",
        HandoffStatus::Rejected => "rejected",
    }
}

fn handoff_status_from_str(s: &str) -> HandoffStatus {
    match s {
        "accepted" => HandoffStatus::Accepted,
        "completed" => HandoffStatus::Completed,
        "rejected" => HandoffStatus::Rejected,
        _ => HandoffStatus::Pending,
    }
}

fn row_to_handoff(row: &SqliteRow) -> Result<WorkHandoff> {
    let data: String = row.get("data");
    Ok(WorkHandoff {
        id: row.get("id"),
        task_id: row.get("task_id"),
        from_agent: row.get("from_agent"),
        to_agent: row.get("to_agent"),
        reason: row.get("reason"),
        data: from_json(&data)?,
        status: handoff_status_from_str(row.get::<String, _>("status").as_str()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const HANDOFF_COLUMNS: &str = "id, task_id, from_agent, to_agent, reason, data, status, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteHandoffRepository {
    pool: SqlitePool,
}

impl SqliteHandoffRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HandoffRepository for SqliteHandoffRepository {
    async fn open(&self, handoff: WorkHandoff) -> Result<WorkHandoff> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO work_handoffs (task_id, from_agent, to_agent, reason, data, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING {HANDOFF_COLUMNS}
            "#
        ))
        .bind(handoff.task_id)
        .bind(&handoff.from_agent)
        .bind(&handoff.to_agent)
        .bind(&handoff.reason)
        .bind(to_json(&handoff.data)?)
        .bind(handoff.created_at)
        .bind(handoff.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_handoff(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<WorkHandoff>> {
        let row = sqlx::query(&format!("SELECT {HANDOFF_COLUMNS} FROM work_handoffs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_handoff).transpose()
    }

    async fn set_status(&self, id: i64, status: HandoffStatus) -> Result<WorkHandoff> {
        let row = sqlx::query(&format!("UPDATE work_handoffs SET status = ? WHERE id = ? RETURNING {HANDOFF_COLUMNS}"))
            .bind(handoff_status_str(status))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .ok_or_else(|| OrchestratorError::not_found("handoff", id))?;
        row_to_handoff(&row)
    }
}

// --- Conflicts ---

fn row_to_conflict(row: &SqliteRow) -> Result<ConflictRecord> {
    let agents: String = row.get("agents");
    Ok(ConflictRecord {
        id: row.get("id"),
        task_id: row.get("task_id"),
        conflict_type: row.get("conflict_type"),
        agents: from_json(&agents)?,
        details: row.get("details"),
        is_resolved: row.get::<i64, _>("is_resolved") != 0,
        resolution_strategy: row.get("resolution_strategy"),
        resolution_details: row.get("resolution_details"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}

const CONFLICT_COLUMNS: &str = "id, task_id, conflict_type, agents, details, is_resolved, resolution_strategy, resolution_details, created_at, resolved_at";

#[derive(Clone)]
pub struct SqliteConflictRepository {
    pool: SqlitePool,
}

impl SqliteConflictRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConflictRepository for SqliteConflictRepository {
    async fn record(&self, conflict: ConflictRecord) -> Result<ConflictRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO conflict_records (task_id, conflict_type, agents, details, is_resolved, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            RETURNING {CONFLICT_COLUMNS}
            "#
        ))
        .bind(conflict.task_id)
        .bind(&conflict.conflict_type)
        .bind(to_json(&conflict.agents)?)
        .bind(&conflict.details)
        .bind(conflict.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_conflict(&row)
    }

    async fn resolve(&self, id: i64, strategy: String, details: String) -> Result<ConflictRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE conflict_records SET is_resolved = 1, resolution_strategy = ?, resolution_details = ?, resolved_at = ?
            WHERE id = ?
            RETURNING {CONFLICT_COLUMNS}
            "#
        ))
        .bind(&strategy)
        .bind(&details)
        .bind(chrono::Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found("conflict", id))?;

        row_to_conflict(&row)
    }

    async fn list_unresolved(&self) -> Result<Vec<ConflictRecord>> {
        let rows = sqlx::query(&format!("SELECT {CONFLICT_COLUMNS} FROM conflict_records WHERE is_resolved = 0 ORDER BY created_at ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_conflict).collect()
    }
}

// --- Messages ---

fn row_to_message(row: &SqliteRow) -> Result<AgentCommunication> {
    let to_agents: String = row.get("to_agents");
    let read_by: String = row.get("read_by");
    Ok(AgentCommunication {
        id: row.get("id"),
        from_agent: row.get("from_agent"),
        to_agents: from_json(&to_agents)?,
        task_id: row.get("task_id"),
        message_type: row.get("message_type"),
        content: row.get("content"),
        priority: priority_from_str(row.get::<String, _>("priority").as_str()),
        created_at: row.get("created_at"),
        read_by: from_json(&read_by)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, from_agent, to_agents, task_id, message_type, content, priority, created_at, read_by";

#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn send(&self, message: AgentCommunication) -> Result<AgentCommunication> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO agent_communications (from_agent, to_agents, task_id, message_type, content, priority, created_at, read_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, '[]')
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(&message.from_agent)
        .bind(to_json(&message.to_agents)?)
        .bind(message.task_id)
        .bind(&message.message_type)
        .bind(&message.content)
        .bind(priority_str(message.priority))
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_message(&row)
    }

    async fn list_for_agent(&self, agent: &str) -> Result<Vec<AgentCommunication>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM agent_communications WHERE from_agent = ? OR to_agents LIKE ? ORDER BY created_at DESC"
        ))
        .bind(agent)
        .bind(format!("%\"{agent}\"%"))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_message).collect()
    }

    async fn mark_read(&self, id: i64, agent: &str) -> Result<()> {
        let row = sqlx::query("SELECT read_by FROM agent_communications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .ok_or_else(|| OrchestratorError::not_found("message", id))?;

        let mut read_by: BTreeSet<String> = from_json(&row.get::<String, _>("read_by"))?;
        read_by.insert(agent.to_string());

        sqlx::query("UPDATE agent_communications SET read_by = ? WHERE id = ?")
            .bind(to_json(&read_by)?)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
