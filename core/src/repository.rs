//! Repository trait contracts for every persisted entity (C1).
//!
//! These traits are the storage seam: `database` provides the SQLite
//! implementation, `testkit` provides hand-rolled in-memory mocks for unit
//! tests of the layers above.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, new_project: NewProject) -> Result<Project>;
    async fn get(&self, id: i64) -> Result<Option<Project>>;
    async fn get_by_name(&self, user_id: &str, name: &str) -> Result<Option<Project>>;
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<Project>>;
    async fn update(&self, id: i64, patch: UpdateProject) -> Result<Project>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn branch_count(&self, id: i64) -> Result<i64>;
}

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn create(&self, new_branch: NewBranch) -> Result<Branch>;
    async fn get(&self, id: i64) -> Result<Option<Branch>>;
    async fn get_by_name(&self, project_id: i64, name: &str) -> Result<Option<Branch>>;
    async fn list(&self, project_id: i64) -> Result<Vec<Branch>>;
    async fn update(&self, id: i64, patch: UpdateBranch) -> Result<Branch>;
    /// Deletes the branch and cascades its tasks; returns the number of
    /// tasks deleted.
    async fn delete(&self, project_id: i64, id: i64) -> Result<u64>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, new_task: NewTask) -> Result<Task>;
    async fn get(&self, id: i64) -> Result<Option<Task>>;
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>>;
    async fn list_by_branch(&self, branch_id: i64) -> Result<Vec<Task>>;
    async fn update(&self, id: i64, patch: UpdateTask) -> Result<Task>;
    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<Task>;
    /// Completes the task; `force` bypasses the subtask-completeness gate
    /// (P5) but never bypasses the dependency gate.
    async fn complete(
        &self,
        id: i64,
        completion_summary: String,
        testing_notes: Option<String>,
        force: bool,
    ) -> Result<Task>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait SubtaskRepository: Send + Sync {
    async fn create(&self, new_subtask: NewSubtask) -> Result<Subtask>;
    async fn get(&self, id: i64) -> Result<Option<Subtask>>;
    async fn list_by_task(&self, task_id: i64) -> Result<Vec<Subtask>>;
    async fn update(&self, id: i64, patch: UpdateSubtask) -> Result<Subtask>;
    async fn complete(&self, id: i64, completion_summary: String) -> Result<Subtask>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn add(&self, task_id: i64, depends_on: i64, dep_type: DependencyType) -> Result<()>;
    async fn remove(&self, task_id: i64, depends_on: i64) -> Result<()>;
    async fn list_for_project(&self, project_id: i64) -> Result<Vec<DependencyEdge>>;
    async fn list_for_task(&self, task_id: i64) -> Result<Vec<DependencyEdge>>;
    async fn dependents_of(&self, task_id: i64) -> Result<Vec<i64>>;
    async fn add_cross_branch(
        &self,
        dependent_task_id: i64,
        prerequisite_task_id: i64,
        dep_type: DependencyType,
    ) -> Result<()>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn register(&self, new_agent: NewAgent) -> Result<Agent>;
    async fn get(&self, project_id: i64, id: &str) -> Result<Option<Agent>>;
    async fn list(&self, project_id: i64) -> Result<Vec<Agent>>;
    async fn update(&self, project_id: i64, id: &str, patch: UpdateAgent) -> Result<Agent>;
    async fn unregister(&self, project_id: i64, id: &str) -> Result<()>;
    async fn adjust_workload(&self, project_id: i64, id: &str, delta: i32) -> Result<Agent>;
    async fn assign_to_branch(
        &self,
        project_id: i64,
        agent_id: &str,
        branch_id: i64,
    ) -> Result<AgentBranchAssignment>;
    async fn list_branch_assignments(&self, project_id: i64) -> Result<Vec<AgentBranchAssignment>>;
}

#[async_trait]
pub trait GlobalContextRepository: Send + Sync {
    async fn get(&self) -> Result<Option<GlobalContext>>;
    async fn upsert(&self, patch: ContextPatch, expected_version: Option<i64>) -> Result<GlobalContext>;
}

#[async_trait]
pub trait ProjectContextRepository: Send + Sync {
    async fn get(&self, project_id: i64) -> Result<Option<ProjectContext>>;
    async fn upsert(
        &self,
        project_id: i64,
        patch: ContextPatch,
        expected_version: Option<i64>,
    ) -> Result<ProjectContext>;
}

#[async_trait]
pub trait BranchContextRepository: Send + Sync {
    async fn get(&self, branch_id: i64) -> Result<Option<BranchContext>>;
    async fn upsert(
        &self,
        branch_id: i64,
        parent_project_id: i64,
        patch: ContextPatch,
        expected_version: Option<i64>,
    ) -> Result<BranchContext>;
}

#[async_trait]
pub trait TaskContextRepository: Send + Sync {
    async fn get(&self, task_id: i64) -> Result<Option<TaskContext>>;
    async fn upsert(
        &self,
        task_id: i64,
        parent_project_id: i64,
        patch: ContextPatch,
        expected_version: Option<i64>,
    ) -> Result<TaskContext>;
    async fn store_resolved(
        &self,
        task_id: i64,
        resolved_context: serde_json::Value,
        dependencies_hash: String,
    ) -> Result<()>;
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn get(&self, level: Tier) -> Result<Option<InheritanceCacheEntry>>;
    async fn put(&self, level: Tier, entry: InheritanceCacheEntry) -> Result<()>;
    async fn invalidate(&self, level: Tier, reason: &str) -> Result<()>;
    async fn invalidate_many(&self, levels: &[Tier], reason: &str) -> Result<()>;
    async fn entry_count(&self) -> Result<i64>;
    async fn evict_lru(&self, keep: i64) -> Result<i64>;
}

#[async_trait]
pub trait DelegationRepository: Send + Sync {
    async fn create(&self, delegation: ContextDelegation) -> Result<ContextDelegation>;
    async fn get(&self, id: i64) -> Result<Option<ContextDelegation>>;
    async fn list_pending_for_target(&self, target_level: Tier) -> Result<Vec<ContextDelegation>>;
    async fn list(&self, target_level: Option<Tier>) -> Result<Vec<ContextDelegation>>;
    async fn mark_processed(
        &self,
        id: i64,
        approved: Option<bool>,
        rejected_reason: Option<String>,
        status: DelegationStatus,
        processed_by: Option<String>,
    ) -> Result<ContextDelegation>;
}

#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn add(&self, insight: ContextInsight) -> Result<ContextInsight>;
    async fn list(&self, level: Tier) -> Result<Vec<ContextInsight>>;
    async fn touch(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait HandoffRepository: Send + Sync {
    async fn open(&self, handoff: WorkHandoff) -> Result<WorkHandoff>;
    async fn get(&self, id: i64) -> Result<Option<WorkHandoff>>;
    async fn set_status(&self, id: i64, status: HandoffStatus) -> Result<WorkHandoff>;
}

#[async_trait]
pub trait ConflictRepository: Send + Sync {
    async fn record(&self, conflict: ConflictRecord) -> Result<ConflictRecord>;
    async fn resolve(&self, id: i64, strategy: String, details: String) -> Result<ConflictRecord>;
    async fn list_unresolved(&self) -> Result<Vec<ConflictRecord>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn send(&self, message: AgentCommunication) -> Result<AgentCommunication>;
    async fn list_for_agent(&self, agent: &str) -> Result<Vec<AgentCommunication>>;
    async fn mark_read(&self, id: i64, agent: &str) -> Result<()>;
}

/// Aggregate health/statistics surface used by `manage_connection`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RepositoryStats {
    pub project_count: i64,
    pub branch_count: i64,
    pub task_count: i64,
    pub agent_count: i64,
    pub cache_entry_count: i64,
}

#[async_trait]
pub trait HealthRepository: Send + Sync {
    async fn health_check(&self) -> Result<()>;
    async fn get_stats(&self) -> Result<RepositoryStats>;
}
