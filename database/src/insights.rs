use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{ContextInsight, Importance, InsightRepository, Result, Tier};

use crate::common::{sqlx_error_to_orchestrator_error, tier_columns, tier_from_columns};

#[derive(Clone)]
pub struct SqliteInsightRepository {
    pool: SqlitePool,
}

impl SqliteInsightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn importance_str(i: Importance) -> &'static str {
    match i {
        Importance::Low => "low",
        Importance::Medium => "medium",
        Importance::High => "high",
        Importance::Critical => "critical",
    }
}

fn importance_from_str(s: &str) -> Importance {
    match s {
        "low" => Importance::Low,
        "high" => Importance::High,
        "critical" => Importance::Critical,
        _ => Importance::Medium,
    }
}

fn row_to_insight(row: &SqliteRow) -> Result<ContextInsight> {
    let level = tier_from_columns(row.get::<String, _>("level").as_str(), row.get("level_id"))?;
    Ok(ContextInsight {
        id: row.get("id"),
        level,
        content: row.get("content"),
        category: row.get("category"),
        importance: importance_from_str(row.get::<String, _>("importance").as_str()),
        confidence: row.get("confidence"),
        source_agent: row.get("source_agent"),
        source_type: row.get("source_type"),
        related_task_id: row.get("related_task_id"),
        actionable: row.get::<i64, _>("actionable") != 0,
        action_taken: row.get::<i64, _>("action_taken") != 0,
        expires_at: row.get("expires_at"),
        accessed_count: row.get("accessed_count"),
        last_accessed: row.get("last_accessed"),
        created_at: row.get("created_at"),
    })
}

const SELECT_COLUMNS: &str = "id, level, level_id, content, category, importance, confidence, source_agent, source_type, related_task_id, actionable, action_taken, expires_at, accessed_count, last_accessed, created_at";

#[async_trait]
impl InsightRepository for SqliteInsightRepository {
    async fn add(&self, insight: ContextInsight) -> Result<ContextInsight> {
        let (level, level_id) = tier_columns(insight.level);
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO context_insights (level, level_id, content, category, importance, confidence, source_agent, source_type, related_task_id, actionable, action_taken, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(level)
        .bind(level_id)
        .bind(&insight.content)
        .bind(&insight.category)
        .bind(importance_str(insight.importance))
        .bind(insight.confidence)
        .bind(&insight.source_agent)
        .bind(&insight.source_type)
        .bind(insight.related_task_id)
        .bind(insight.actionable as i64)
        .bind(insight.expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_insight(&row)
    }

    async fn list(&self, level: Tier) -> Result<Vec<ContextInsight>> {
        let (level_name, level_id) = tier_columns(level);
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM context_insights WHERE level = ? AND level_id = ? ORDER BY created_at DESC"
        ))
        .bind(level_name)
        .bind(level_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_insight).collect()
    }

    async fn touch(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE context_insights SET accessed_count = accessed_count + 1, last_accessed = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}
