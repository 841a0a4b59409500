//! Agent registration, branch assignment, and `Rebalance` (§4.5).

use std::collections::{HashMap, HashSet};

use orchestrator_core::{Agent, Branch, OrchestratorError, Result};

/// Workload expressed as a fraction of `max_concurrent_tasks`; an agent
/// with no declared capacity is treated as fully loaded so it is never
/// picked as a rebalance target.
pub fn workload_fraction(agent: &Agent) -> f64 {
    if agent.max_concurrent_tasks <= 0 {
        return 1.0;
    }
    agent.current_workload as f64 / agent.max_concurrent_tasks as f64
}

pub fn check_capacity(agent: &Agent) -> Result<()> {
    if agent.has_capacity() {
        Ok(())
    } else {
        Err(OrchestratorError::capacity(format!(
            "agent '{}' is at capacity ({}/{})",
            agent.id, agent.current_workload, agent.max_concurrent_tasks
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Reassignment {
    pub branch_id: i64,
    pub from_agent: Option<String>,
    pub to_agent: String,
}

/// Pure rebalance decision function: for every branch whose assigned agent
/// is at or above full workload, picks the available agent with the lowest
/// workload that shares at least one capability with the branch's task
/// labels. Ties broken by agent id ascending. Branches with no eligible
/// replacement are left untouched.
pub fn plan_rebalance(
    agents: &[Agent],
    branches: &[Branch],
    branch_task_labels: &HashMap<i64, HashSet<String>>,
) -> Vec<Reassignment> {
    let mut by_id: HashMap<&str, &Agent> = HashMap::new();
    for agent in agents {
        by_id.insert(agent.id.as_str(), agent);
    }

    let mut plan = Vec::new();
    for branch in branches {
        let Some(current_id) = branch.assigned_agent_id.as_deref() else { continue };
        let Some(current_agent) = by_id.get(current_id) else { continue };
        if workload_fraction(current_agent) < 1.0 {
            continue;
        }

        let empty = HashSet::new();
        let labels = branch_task_labels.get(&branch.id).unwrap_or(&empty);
        let mut candidates: Vec<&Agent> = agents
            .iter()
            .filter(|a| a.id != current_id)
            .filter(|a| a.has_capacity())
            .filter(|a| labels.is_empty() || a.capabilities.iter().any(|c| labels.contains(c)))
            .collect();

        candidates.sort_by(|a, b| {
            workload_fraction(a)
                .partial_cmp(&workload_fraction(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(winner) = candidates.first() {
            plan.push(Reassignment {
                branch_id: branch.id,
                from_agent: Some(current_id.to_string()),
                to_agent: winner.id.clone(),
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchestrator_core::{AgentAvailability, BranchStatus, Priority};

    fn agent(id: &str, workload: i32, max: i32, caps: &[&str]) -> Agent {
        Agent {
            id: id.into(),
            project_id: 1,
            name: id.into(),
            description: String::new(),
            call_agent: None,
            capabilities: caps.iter().map(|s| s.to_string()).collect(),
            specializations: Default::default(),
            status: AgentAvailability::Available,
            max_concurrent_tasks: max,
            current_workload: workload,
            completed_tasks: 0,
            success_rate: 1.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn branch(id: i64, assigned: Option<&str>) -> Branch {
        Branch {
            id,
            project_id: 1,
            name: format!("b{id}"),
            description: String::new(),
            assigned_agent_id: assigned.map(|s| s.to_string()),
            priority: Priority::Medium,
            status: BranchStatus::Active,
            task_count: 1,
            completed_task_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reassigns_overloaded_branch_to_lowest_workload_matching_capability() {
        let agents = vec![agent("a1", 3, 3, &["backend"]), agent("a2", 1, 3, &["backend"]), agent("a3", 0, 3, &["frontend"])];
        let branches = vec![branch(1, Some("a1"))];
        let mut labels = HashMap::new();
        labels.insert(1, ["backend".to_string()].into_iter().collect());

        let plan = plan_rebalance(&agents, &branches, &labels);
        assert_eq!(plan, vec![Reassignment { branch_id: 1, from_agent: Some("a1".into()), to_agent: "a2".into() }]);
    }

    #[test]
    fn leaves_branch_alone_when_current_agent_has_capacity() {
        let agents = vec![agent("a1", 1, 3, &["backend"])];
        let branches = vec![branch(1, Some("a1"))];
        let plan = plan_rebalance(&agents, &branches, &HashMap::new());
        assert!(plan.is_empty());
    }

    #[test]
    fn leaves_branch_alone_when_no_capable_replacement_exists() {
        let agents = vec![agent("a1", 3, 3, &["backend"]), agent("a2", 0, 3, &["frontend"])];
        let branches = vec![branch(1, Some("a1"))];
        let mut labels = HashMap::new();
        labels.insert(1, ["backend".to_string()].into_iter().collect());
        let plan = plan_rebalance(&agents, &branches, &labels);
        assert!(plan.is_empty());
    }
}
