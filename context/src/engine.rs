//! The Context Engine entry surface (C2): `resolve`, `update`, `delegate`,
//! `invalidate`, plus insight tracking — tying the pure merge logic in
//! [`crate::resolver`] to the repository traits in `orchestrator_core`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use orchestrator_core::{
    BranchContextRepository, BranchRepository, CacheRepository, ContextDelegation, ContextInsight,
    ContextPatch, DelegationRepository, DelegationStatus, GlobalContextRepository, Importance,
    InheritanceCacheEntry, InsightRepository, OrchestratorError, ProjectContextRepository,
    ProjectRepository, Result, TaskContextRepository, TaskRepository, Tier, TriggerType,
};

use crate::cache::{self, CacheConfig};
use crate::resolver::{resolve_chain, TierSnapshot};
use crate::locks::KeyedLocks;

fn empty_snapshot(level: Tier) -> TierSnapshot {
    TierSnapshot { level, data: json!({}), overrides: json!({}), inheritance_disabled: false, updated_at: Utc::now() }
}

fn tier_label(tier: &Tier) -> String {
    match tier.id() {
        Some(id) => format!("{}:{id}", tier.name()),
        None => tier.name().to_string(),
    }
}

pub struct ContextEngine {
    global: Arc<dyn GlobalContextRepository>,
    project_contexts: Arc<dyn ProjectContextRepository>,
    branch_contexts: Arc<dyn BranchContextRepository>,
    task_contexts: Arc<dyn TaskContextRepository>,
    cache: Arc<dyn CacheRepository>,
    projects: Arc<dyn ProjectRepository>,
    branches: Arc<dyn BranchRepository>,
    tasks: Arc<dyn TaskRepository>,
    delegations: Arc<dyn DelegationRepository>,
    insights: Arc<dyn InsightRepository>,
    recompute_locks: KeyedLocks<Tier>,
    cache_config: CacheConfig,
    delegation_queue: Option<mpsc::Sender<i64>>,
}

impl ContextEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        global: Arc<dyn GlobalContextRepository>,
        project_contexts: Arc<dyn ProjectContextRepository>,
        branch_contexts: Arc<dyn BranchContextRepository>,
        task_contexts: Arc<dyn TaskContextRepository>,
        cache: Arc<dyn CacheRepository>,
        projects: Arc<dyn ProjectRepository>,
        branches: Arc<dyn BranchRepository>,
        tasks: Arc<dyn TaskRepository>,
        delegations: Arc<dyn DelegationRepository>,
        insights: Arc<dyn InsightRepository>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            global,
            project_contexts,
            branch_contexts,
            task_contexts,
            cache,
            projects,
            branches,
            tasks,
            delegations,
            insights,
            recompute_locks: KeyedLocks::new(),
            cache_config,
            delegation_queue: None,
        }
    }

    /// Wires a background delegation worker's inbound channel so `delegate`
    /// enqueues newly created delegations for asynchronous processing.
    pub fn with_delegation_queue(mut self, tx: mpsc::Sender<i64>) -> Self {
        self.delegation_queue = Some(tx);
        self
    }

    pub fn delegations(&self) -> Arc<dyn DelegationRepository> {
        self.delegations.clone()
    }

    pub fn insights(&self) -> Arc<dyn InsightRepository> {
        self.insights.clone()
    }

    async fn tier_chain(&self, level: Tier) -> Result<Vec<Tier>> {
        let mut chain = vec![level];
        match level {
            Tier::Task(task_id) => {
                let task = self
                    .tasks
                    .get(task_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found("task", task_id))?;
                let branch = self
                    .branches
                    .get(task.branch_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found("branch", task.branch_id))?;
                chain.push(Tier::Branch(branch.id));
                chain.push(Tier::Project(branch.project_id));
                chain.push(Tier::Global);
            }
            Tier::Branch(branch_id) => {
                let branch = self
                    .branches
                    .get(branch_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found("branch", branch_id))?;
                chain.push(Tier::Project(branch.project_id));
                chain.push(Tier::Global);
            }
            Tier::Project(_) => chain.push(Tier::Global),
            Tier::Global => {}
        }
        chain.reverse();
        Ok(chain)
    }

    /// A tier with no record yet contributes an empty map rather than
    /// `NOT_FOUND`; only an explicit single-tier read (`manage_context
    /// action=get`) surfaces that as missing.
    async fn snapshot(&self, level: Tier) -> Result<TierSnapshot> {
        let snap = match level {
            Tier::Global => match self.global.get().await? {
                Some(ctx) => TierSnapshot {
                    level,
                    data: ctx.data,
                    overrides: json!({}),
                    inheritance_disabled: ctx.inheritance_disabled,
                    updated_at: ctx.updated_at,
                },
                None => empty_snapshot(level),
            },
            Tier::Project(id) => match self.project_contexts.get(id).await? {
                Some(ctx) => TierSnapshot {
                    level,
                    data: ctx.data,
                    overrides: ctx.global_overrides,
                    inheritance_disabled: ctx.inheritance_disabled,
                    updated_at: ctx.updated_at,
                },
                None => empty_snapshot(level),
            },
            Tier::Branch(id) => match self.branch_contexts.get(id).await? {
                Some(ctx) => TierSnapshot {
                    level,
                    data: ctx.data,
                    overrides: ctx.local_overrides,
                    inheritance_disabled: ctx.inheritance_disabled,
                    updated_at: ctx.updated_at,
                },
                None => empty_snapshot(level),
            },
            Tier::Task(id) => match self.task_contexts.get(id).await? {
                Some(ctx) => TierSnapshot {
                    level,
                    data: ctx.task_data,
                    overrides: ctx.local_overrides,
                    inheritance_disabled: ctx.inheritance_disabled,
                    updated_at: ctx.updated_at,
                },
                None => empty_snapshot(level),
            },
        };
        Ok(snap)
    }

    pub async fn resolve(&self, level: Tier, force_refresh: bool) -> Result<InheritanceCacheEntry> {
        let lock = self.recompute_locks.get(level);
        let _guard = lock.lock().await;

        let chain = self.tier_chain(level).await?;
        let mut snapshots = Vec::with_capacity(chain.len());
        for tier in &chain {
            snapshots.push(self.snapshot(*tier).await?);
        }

        let force_local_only = match level {
            Tier::Task(id) => self.task_contexts.get(id).await?.map(|c| c.force_local_only).unwrap_or(false),
            _ => false,
        };

        let outcome = resolve_chain(&snapshots, force_local_only);

        if let Some(existing) = self.cache.get(level).await? {
            if cache::is_fresh(&existing, &outcome.dependencies_hash, force_refresh) {
                let hit = cache::record_hit(&existing);
                self.cache.put(level, hit.clone()).await?;
                return Ok(hit);
            }
        }

        let entry = cache::build_entry(level, &outcome, &self.cache_config);
        self.cache.put(level, entry.clone()).await?;
        if let Tier::Task(id) = level {
            self.task_contexts
                .store_resolved(id, outcome.resolved.clone(), outcome.dependencies_hash.clone())
                .await?;
        }
        Ok(entry)
    }

    pub async fn update(&self, level: Tier, patch: ContextPatch, expected_version: Option<i64>, propagate: bool) -> Result<()> {
        match level {
            Tier::Global => {
                self.global.upsert(patch, expected_version).await?;
            }
            Tier::Project(id) => {
                self.project_contexts.upsert(id, patch, expected_version).await?;
            }
            Tier::Branch(id) => {
                let branch = self.branches.get(id).await?.ok_or_else(|| OrchestratorError::not_found("branch", id))?;
                self.branch_contexts.upsert(id, branch.project_id, patch, expected_version).await?;
            }
            Tier::Task(id) => {
                let task = self.tasks.get(id).await?.ok_or_else(|| OrchestratorError::not_found("task", id))?;
                let branch = self
                    .branches
                    .get(task.branch_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found("branch", task.branch_id))?;
                self.task_contexts.upsert(id, branch.project_id, patch, expected_version).await?;
            }
        }
        if propagate {
            self.propagate(level).await?;
        }
        Ok(())
    }

    async fn affected_tiers(&self, level: Tier) -> Result<Vec<Tier>> {
        match level {
            Tier::Task(id) => Ok(vec![Tier::Task(id)]),
            Tier::Branch(id) => {
                let mut out = vec![Tier::Branch(id)];
                for task in self.tasks.list_by_branch(id).await? {
                    out.push(Tier::Task(task.id));
                }
                Ok(out)
            }
            Tier::Project(id) => {
                let mut out = vec![Tier::Project(id)];
                for branch in self.branches.list(id).await? {
                    out.push(Tier::Branch(branch.id));
                    for task in self.tasks.list_by_branch(branch.id).await? {
                        out.push(Tier::Task(task.id));
                    }
                }
                Ok(out)
            }
            Tier::Global => {
                let mut out = vec![Tier::Global];
                for project in self.projects.list(None).await? {
                    out.push(Tier::Project(project.id));
                    for branch in self.branches.list(project.id).await? {
                        out.push(Tier::Branch(branch.id));
                        for task in self.tasks.list_by_branch(branch.id).await? {
                            out.push(Tier::Task(task.id));
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    async fn propagate(&self, level: Tier) -> Result<()> {
        let affected = self.affected_tiers(level).await?;
        if !affected.is_empty() {
            let reason = format!("propagated from {}", tier_label(&level));
            self.cache.invalidate_many(&affected, &reason).await?;
        }
        Ok(())
    }

    /// Direct, caller-initiated invalidation (not a propagation side effect).
    pub async fn invalidate(&self, level: Tier, reason: &str) -> Result<()> {
        self.cache.invalidate(level, reason).await
    }

    /// The auto-merge rule set configured at `level`, used by the delegation
    /// worker to decide whether an automatic trigger may merge without
    /// manual approval. Branch targets carry no explicit rule slot and
    /// default to "manual only".
    pub(crate) async fn delegation_rules_for(&self, level: Tier) -> Result<Value> {
        let rules = match level {
            Tier::Global => self.global.get().await?.map(|c| c.delegation_rules),
            Tier::Project(id) => self.project_contexts.get(id).await?.map(|c| c.delegation_rules),
            Tier::Branch(_) => None,
            Tier::Task(id) => self.task_contexts.get(id).await?.map(|c| c.delegation_triggers),
        };
        Ok(rules.unwrap_or_else(|| json!({})))
    }

    pub async fn delegate(
        &self,
        source_level: Tier,
        target_level: Tier,
        data: Value,
        reason: String,
        trigger_type: TriggerType,
        created_by: String,
    ) -> Result<i64> {
        if target_level.rank() <= source_level.rank() {
            return Err(OrchestratorError::invalid(
                "delegation target must be strictly above the source in the tier hierarchy",
            ));
        }
        let now = Utc::now();
        let delegation = ContextDelegation {
            id: 0,
            source_level,
            target_level,
            delegated_data: data,
            reason,
            trigger_type,
            confidence: None,
            auto_delegated: matches!(trigger_type, TriggerType::AutoThreshold | TriggerType::AutoPattern),
            processed: false,
            approved: None,
            rejected_reason: None,
            impact_assessment: None,
            implementation_status: DelegationStatus::Pending,
            created_at: now,
            updated_at: now,
            created_by,
            processed_by: None,
        };
        let stored = self.delegations.create(delegation).await?;
        if let Some(tx) = &self.delegation_queue {
            // Best-effort: a full queue means the worker is behind; the
            // delegation still exists for manual processing via `list`.
            let _ = tx.try_send(stored.id);
        }
        Ok(stored.id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_insight(
        &self,
        level: Tier,
        content: String,
        category: String,
        importance: Importance,
        confidence: f64,
        source_agent: String,
        related_task_id: Option<i64>,
    ) -> Result<ContextInsight> {
        let insight = ContextInsight {
            id: 0,
            level,
            content,
            category,
            importance,
            confidence,
            source_agent,
            source_type: "agent".to_string(),
            related_task_id,
            actionable: false,
            action_taken: false,
            expires_at: None,
            accessed_count: 0,
            last_accessed: None,
            created_at: Utc::now(),
        };
        self.insights.add(insight).await
    }
}
