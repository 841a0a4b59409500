use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A context tier in the inheritance hierarchy, strictly ordered
/// `task < branch < project < global`.
///
/// Each non-global variant carries the id of the record it addresses, so a
/// `Tier` value is self-describing: it names both "which level" and "which
/// row at that level" without a side lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum Tier {
    Global,
    Project(i64),
    Branch(i64),
    Task(i64),
}

impl Tier {
    /// Strict ordering low to high: task=0, branch=1, project=2, global=3.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Task(_) => 0,
            Tier::Branch(_) => 1,
            Tier::Project(_) => 2,
            Tier::Global => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Global => "global",
            Tier::Project(_) => "project",
            Tier::Branch(_) => "branch",
            Tier::Task(_) => "task",
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Tier::Global => None,
            Tier::Project(id) | Tier::Branch(id) | Tier::Task(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub user_id: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub metadata: Option<Value>,
}

/// Branch priority, shared with task/subtask priority (the spec defines a
/// single five-level priority scale used throughout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Rank used for scheduler sorting: higher value sorts first (descending).
impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
            Priority::Critical => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Todo,
    Active,
    Blocked,
    Done,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub assigned_agent_id: Option<String>,
    pub priority: Priority,
    pub status: BranchStatus,
    pub task_count: i64,
    pub completed_task_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// The protected default branch; cannot be deleted (§4.1 `DeleteBranch`).
    pub const PROTECTED_NAME: &'static str = "main";

    pub fn is_protected(&self) -> bool {
        self.name == Self::PROTECTED_NAME
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBranch {
    pub project_id: i64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBranch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<BranchStatus>,
    pub assigned_agent_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Testing,
    Done,
    Blocked,
    Cancelled,
    Archived,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled | TaskStatus::Archived)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Testing => "testing",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub branch_id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub details: String,
    pub estimated_effort: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub context_id: Option<i64>,
    pub assignees: BTreeSet<String>,
    pub labels: BTreeSet<String>,
    pub dependencies: BTreeSet<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub branch_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignees: BTreeSet<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_effort: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub details: Option<String>,
    pub estimated_effort: Option<Option<i32>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub assignees: Option<BTreeSet<String>>,
    pub labels: Option<BTreeSet<String>>,
    pub dependencies: Option<BTreeSet<i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub branch_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub label: Option<String>,
    pub assignee: Option<String>,
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Blocks,
    Related,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub task_id: i64,
    pub depends_on_task_id: i64,
    pub dep_type: DependencyType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossBranchDependency {
    pub dependent_task_id: i64,
    pub prerequisite_task_id: i64,
    pub dep_type: DependencyType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignees: BTreeSet<String>,
    pub estimated_effort: Option<i32>,
    pub progress_percentage: f64,
    pub progress_notes: String,
    pub blockers: String,
    pub completion_summary: Option<String>,
    pub impact_on_parent: Option<String>,
    pub insights_found: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSubtask {
    pub task_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignees: BTreeSet<String>,
    pub estimated_effort: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSubtask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignees: Option<BTreeSet<String>>,
    pub estimated_effort: Option<Option<i32>>,
    pub progress_percentage: Option<f64>,
    pub progress_notes: Option<String>,
    pub blockers: Option<String>,
    pub impact_on_parent: Option<String>,
    pub insights_found: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentAvailability {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub call_agent: Option<String>,
    pub capabilities: BTreeSet<String>,
    pub specializations: BTreeSet<String>,
    pub status: AgentAvailability,
    pub max_concurrent_tasks: i32,
    pub current_workload: i32,
    pub completed_tasks: i32,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn has_capacity(&self) -> bool {
        self.current_workload < self.max_concurrent_tasks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAgent {
    pub id: String,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub call_agent: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub specializations: BTreeSet<String>,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: i32,
}

fn default_max_concurrent_tasks() -> i32 {
    3
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAgent {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capabilities: Option<BTreeSet<String>>,
    pub specializations: Option<BTreeSet<String>>,
    pub status: Option<AgentAvailability>,
    pub max_concurrent_tasks: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBranchAssignment {
    pub project_id: i64,
    pub agent_id: String,
    pub branch_id: i64,
    pub assigned_at: DateTime<Utc>,
}

// --- Context records (C2) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalContext {
    pub data: Value,
    pub delegation_rules: Value,
    pub inheritance_disabled: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: i64,
    pub data: Value,
    pub global_overrides: Value,
    pub delegation_rules: Value,
    pub inheritance_disabled: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchContext {
    pub branch_id: i64,
    pub parent_project_id: i64,
    pub data: Value,
    pub local_overrides: Value,
    pub inheritance_disabled: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: i64,
    pub parent_project_id: i64,
    pub task_data: Value,
    pub local_overrides: Value,
    pub implementation_notes: String,
    pub delegation_triggers: Value,
    pub inheritance_disabled: bool,
    pub force_local_only: bool,
    pub resolved_context: Option<Value>,
    pub dependencies_hash: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patch written by `manage_context action=update`; `data` is merged
/// key-by-key into the tier's own record, not replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPatch {
    pub data: Option<Value>,
    pub overrides: Option<Value>,
    pub inheritance_disabled: Option<bool>,
    pub force_local_only: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextInsight {
    pub id: i64,
    pub level: Tier,
    pub content: String,
    pub category: String,
    pub importance: Importance,
    pub confidence: f64,
    pub source_agent: String,
    pub source_type: String,
    pub related_task_id: Option<i64>,
    pub actionable: bool,
    pub action_taken: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub accessed_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    AutoThreshold,
    AutoPattern,
    AiInitiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    Pending,
    Implemented,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDelegation {
    pub id: i64,
    pub source_level: Tier,
    pub target_level: Tier,
    pub delegated_data: Value,
    pub reason: String,
    pub trigger_type: TriggerType,
    pub confidence: Option<f64>,
    pub auto_delegated: bool,
    pub processed: bool,
    pub approved: Option<bool>,
    pub rejected_reason: Option<String>,
    pub impact_assessment: Option<String>,
    pub implementation_status: DelegationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub processed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceCacheEntry {
    pub level: Tier,
    pub resolved_context: Value,
    pub dependencies_hash: String,
    pub resolution_path: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: i64,
    pub last_hit: Option<DateTime<Utc>>,
    pub size_bytes: i64,
    pub invalidated: bool,
    pub invalidation_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationRecord {
    pub id: i64,
    pub source_level: Tier,
    pub change_type: String,
    pub affected_count: i64,
    pub status: PropagationStatus,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- Agent coordination (C5) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Accepted,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHandoff {
    pub id: i64,
    pub task_id: i64,
    pub from_agent: String,
    pub to_agent: String,
    pub reason: String,
    pub data: Value,
    pub status: HandoffStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: i64,
    pub task_id: Option<i64>,
    pub conflict_type: String,
    pub agents: BTreeSet<String>,
    pub details: String,
    pub is_resolved: bool,
    pub resolution_strategy: Option<String>,
    pub resolution_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommunication {
    pub id: i64,
    pub from_agent: String,
    pub to_agents: BTreeSet<String>,
    pub task_id: Option<i64>,
    pub message_type: String,
    pub content: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub read_by: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_rank_is_strictly_increasing() {
        assert!(Tier::Task(1).rank() < Tier::Branch(1).rank());
        assert!(Tier::Branch(1).rank() < Tier::Project(1).rank());
        assert!(Tier::Project(1).rank() < Tier::Global.rank());
    }

    #[test]
    fn priority_rank_orders_critical_highest() {
        assert!(Priority::Critical.rank() > Priority::Urgent.rank());
        assert!(Priority::Urgent.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn branch_protected_name_detection() {
        let branch = Branch {
            id: 1,
            project_id: 1,
            name: "main".to_string(),
            description: String::new(),
            assigned_agent_id: None,
            priority: Priority::Medium,
            status: BranchStatus::Todo,
            task_count: 0,
            completed_task_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(branch.is_protected());
    }
}
