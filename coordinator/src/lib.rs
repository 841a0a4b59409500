//! Agent Coordinator (C5): registration, branch assignment, rebalance,
//! handoffs, conflicts, and messaging.
//!
//! - [`agents`] — workload accounting and the pure `Rebalance` planner.
//! - [`handoff`] — handoff status transition rules.
//! - [`conflict`] — conflict record construction.
//! - [`messaging`] — agent communication record construction.

pub mod agents;
pub mod conflict;
pub mod handoff;
pub mod messaging;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use orchestrator_core::{
    Agent, AgentBranchAssignment, AgentRepository, BranchRepository, ConflictRecord, ConflictRepository,
    HandoffRepository, HandoffStatus, Importance, MessageRepository, NewAgent, OrchestratorError, Priority,
    Result, TaskRepository, Tier, UpdateAgent, UpdateBranch, WorkHandoff,
};
use orchestrator_context::ContextEngine;

pub use agents::Reassignment;

pub struct Coordinator {
    agents: Arc<dyn AgentRepository>,
    branches: Arc<dyn BranchRepository>,
    tasks: Arc<dyn TaskRepository>,
    handoffs: Arc<dyn HandoffRepository>,
    conflicts: Arc<dyn ConflictRepository>,
    messages: Arc<dyn MessageRepository>,
    context: Arc<ContextEngine>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        branches: Arc<dyn BranchRepository>,
        tasks: Arc<dyn TaskRepository>,
        handoffs: Arc<dyn HandoffRepository>,
        conflicts: Arc<dyn ConflictRepository>,
        messages: Arc<dyn MessageRepository>,
        context: Arc<ContextEngine>,
    ) -> Self {
        Self { agents, branches, tasks, handoffs, conflicts, messages, context }
    }

    pub async fn register_agent(&self, new_agent: NewAgent) -> Result<Agent> {
        self.agents.register(new_agent).await
    }

    pub async fn update_agent(&self, project_id: i64, id: &str, patch: UpdateAgent) -> Result<Agent> {
        self.agents.update(project_id, id, patch).await
    }

    pub async fn assign_agent_to_branch(&self, project_id: i64, agent_id: &str, branch_id: i64) -> Result<AgentBranchAssignment> {
        let assignment = self.agents.assign_to_branch(project_id, agent_id, branch_id).await?;
        let branch = self.branches.get(branch_id).await?.ok_or_else(|| OrchestratorError::not_found("branch", branch_id))?;
        if branch.assigned_agent_id.is_none() {
            self.branches
                .update(branch_id, UpdateBranch { assigned_agent_id: Some(Some(agent_id.to_string())), ..Default::default() })
                .await?;
        }
        Ok(assignment)
    }

    /// Increments workload when an assignee is added to a task; fails
    /// `CAPACITY` if the agent is already at its limit.
    pub async fn on_assignee_added(&self, project_id: i64, agent_id: &str) -> Result<Agent> {
        let agent = self.agents.get(project_id, agent_id).await?.ok_or_else(|| OrchestratorError::not_found("agent", 0))?;
        agents::check_capacity(&agent)?;
        self.agents.adjust_workload(project_id, agent_id, 1).await
    }

    pub async fn on_assignee_removed(&self, project_id: i64, agent_id: &str) -> Result<Agent> {
        self.agents.adjust_workload(project_id, agent_id, -1).await
    }

    pub async fn rebalance(&self, project_id: i64) -> Result<Vec<Reassignment>> {
        let agent_list = self.agents.list(project_id).await?;
        let branch_list = self.branches.list(project_id).await?;

        let mut branch_task_labels: HashMap<i64, HashSet<String>> = HashMap::new();
        for branch in &branch_list {
            let tasks = self.tasks.list_by_branch(branch.id).await?;
            let labels: HashSet<String> = tasks.iter().flat_map(|t| t.labels.iter().cloned()).collect();
            branch_task_labels.insert(branch.id, labels);
        }

        let plan = agents::plan_rebalance(&agent_list, &branch_list, &branch_task_labels);
        for reassignment in &plan {
            self.branches
                .update(
                    reassignment.branch_id,
                    UpdateBranch { assigned_agent_id: Some(Some(reassignment.to_agent.clone())), ..Default::default() },
                )
                .await?;
        }
        Ok(plan)
    }

    pub async fn open_handoff(&self, task_id: i64, from_agent: String, to_agent: String, reason: String, data: serde_json::Value) -> Result<WorkHandoff> {
        let now = chrono::Utc::now();
        self.handoffs
            .open(WorkHandoff { id: 0, task_id, from_agent, to_agent, reason, data, status: HandoffStatus::Pending, created_at: now, updated_at: now })
            .await
    }

    async fn transition_handoff(&self, id: i64, to: HandoffStatus) -> Result<WorkHandoff> {
        let current = self.handoffs.get(id).await?.ok_or_else(|| OrchestratorError::not_found("handoff", id))?;
        if !handoff::can_transition(current.status, to) {
            return Err(OrchestratorError::conflict(format!("cannot move handoff {id} from {:?} to {:?}", current.status, to)));
        }
        self.handoffs.set_status(id, to).await
    }

    pub async fn accept_handoff(&self, id: i64) -> Result<WorkHandoff> {
        self.transition_handoff(id, HandoffStatus::Accepted).await
    }

    pub async fn reject_handoff(&self, id: i64) -> Result<WorkHandoff> {
        self.transition_handoff(id, HandoffStatus::Rejected).await
    }

    pub async fn complete_handoff(&self, id: i64, source_agent: String) -> Result<WorkHandoff> {
        let handoff = self.transition_handoff(id, HandoffStatus::Completed).await?;
        self.context
            .add_insight(
                Tier::Task(handoff.task_id),
                format!("Work handed off from {} to {}: {}", handoff.from_agent, handoff.to_agent, handoff.reason),
                "handoff".to_string(),
                Importance::Medium,
                1.0,
                source_agent,
                Some(handoff.task_id),
            )
            .await?;
        Ok(handoff)
    }

    pub async fn record_conflict(&self, task_id: Option<i64>, conflict_type: String, agents: BTreeSet<String>, details: String) -> Result<ConflictRecord> {
        self.conflicts.record(conflict::new_conflict(task_id, conflict_type, agents, details)).await
    }

    pub async fn resolve_conflict(&self, id: i64, strategy: String, details: String) -> Result<ConflictRecord> {
        self.conflicts.resolve(id, strategy, details).await
    }

    pub async fn send_message(
        &self,
        from_agent: String,
        to_agents: BTreeSet<String>,
        task_id: Option<i64>,
        message_type: String,
        content: String,
        priority: Priority,
    ) -> Result<orchestrator_core::AgentCommunication> {
        self.messages.send(messaging::new_message(from_agent, to_agents, task_id, message_type, content, priority)).await
    }
}
