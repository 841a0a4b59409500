use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{ContextDelegation, DelegationRepository, DelegationStatus, OrchestratorError, Result, Tier, TriggerType};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, tier_columns, tier_from_columns, to_json};

#[derive(Clone)]
pub struct SqliteDelegationRepository {
    pool: SqlitePool,
}

impl SqliteDelegationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn trigger_str(t: TriggerType) -> &'static str {
    match t {
        TriggerType::Manual => "manual",
        TriggerType::AutoThreshold => "auto_threshold",
        TriggerType::AutoPattern => "auto_pattern",
        TriggerType::AiInitiated => "ai_initiated",
    }
}

fn trigger_from_str(s: &str) -> TriggerType {
    match s {
        "auto_threshold" => TriggerType::AutoThreshold,
        "auto_pattern" => TriggerType::AutoPattern,
        "ai_initiated" => TriggerType::AiInitiated,
        _ => TriggerType::Manual,
    }
}

fn status_str(s: DelegationStatus) -> &'static str {
    match s {
        DelegationStatus::Pending => "pending",
        DelegationStatus::Implemented => "implemented",
        DelegationStatus::Rejected => "rejected",
        DelegationStatus::Expired => "expired",
    }
}

fn status_from_str(s: &str) -> DelegationStatus {
    match s {
        "implemented" => DelegationStatus::Implemented,
        "rejected" => DelegationStatus::Rejected,
        "expired" => DelegationStatus::Expired,
        _ => DelegationStatus::Pending,
    }
}

fn row_to_delegation(row: &SqliteRow) -> Result<ContextDelegation> {
    let delegated_data: String = row.get("delegated_data");
    let source_level = tier_from_columns(row.get::<String, _>("source_level").as_str(), row.get("source_id"))?;
    let target_level = tier_from_columns(row.get::<String, _>("target_level").as_str(), row.get("target_id"))?;
    Ok(ContextDelegation {
        id: row.get("id"),
        source_level,
        target_level,
        delegated_data: from_json(&delegated_data)?,
        reason: row.get("reason"),
        trigger_type: trigger_from_str(row.get::<String, _>("trigger_type").as_str()),
        confidence: row.get("confidence"),
        auto_delegated: row.get::<i64, _>("auto_delegated") != 0,
        processed: row.get::<i64, _>("processed") != 0,
        approved: row.get::<Option<i64>, _>("approved").map(|v| v != 0),
        rejected_reason: row.get("rejected_reason"),
        impact_assessment: row.get("impact_assessment"),
        implementation_status: status_from_str(row.get::<String, _>("implementation_status").as_str()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        created_by: row.get("created_by"),
        processed_by: row.get("processed_by"),
    })
}

const SELECT_COLUMNS: &str = "id, source_level, source_id, target_level, target_id, delegated_data, reason, trigger_type, confidence, auto_delegated, processed, approved, rejected_reason, impact_assessment, implementation_status, created_at, updated_at, created_by, processed_by";

#[async_trait]
impl DelegationRepository for SqliteDelegationRepository {
    async fn create(&self, delegation: ContextDelegation) -> Result<ContextDelegation> {
        let now = Utc::now();
        let (source_level, source_id) = tier_columns(delegation.source_level);
        let (target_level, target_id) = tier_columns(delegation.target_level);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO context_delegations (source_level, source_id, target_level, target_id, delegated_data, reason, trigger_type, confidence, auto_delegated, processed, implementation_status, created_at, updated_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'pending', ?, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(source_level)
        .bind(source_id)
        .bind(target_level)
        .bind(target_id)
        .bind(to_json(&delegation.delegated_data)?)
        .bind(&delegation.reason)
        .bind(trigger_str(delegation.trigger_type))
        .bind(delegation.confidence)
        .bind(delegation.auto_delegated as i64)
        .bind(now)
        .bind(now)
        .bind(&delegation.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_delegation(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<ContextDelegation>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM context_delegations WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_delegation).transpose()
    }

    async fn list_pending_for_target(&self, target_level: Tier) -> Result<Vec<ContextDelegation>> {
        let (level, id) = tier_columns(target_level);
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM context_delegations WHERE target_level = ? AND target_id = ? AND processed = 0 ORDER BY created_at ASC"
        ))
        .bind(level)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_delegation).collect()
    }

    async fn list(&self, target_level: Option<Tier>) -> Result<Vec<ContextDelegation>> {
        let rows = match target_level {
            Some(tier) => {
                let (level, id) = tier_columns(tier);
                sqlx::query(&format!(
                    "SELECT {SELECT_COLUMNS} FROM context_delegations WHERE target_level = ? AND target_id = ? ORDER BY created_at ASC"
                ))
                .bind(level)
                .bind(id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM context_delegations ORDER BY created_at ASC"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_delegation).collect()
    }

    async fn mark_processed(
        &self,
        id: i64,
        approved: Option<bool>,
        rejected_reason: Option<String>,
        status: DelegationStatus,
        processed_by: Option<String>,
    ) -> Result<ContextDelegation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE context_delegations SET processed = 1, approved = ?, rejected_reason = ?, implementation_status = ?, processed_by = ?
            WHERE id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(approved.map(|v| v as i64))
        .bind(&rejected_reason)
        .bind(status_str(status))
        .bind(&processed_by)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found("delegation", id))?;

        row_to_delegation(&row)
    }
}
