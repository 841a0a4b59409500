//! Tool Dispatch Facade (C6): the single entry point every transport calls
//! into. Each `manage_*` tool is keyed by an `action` string; every call
//! returns the envelope defined in [`Envelope`] regardless of success.
//!
//! The facade owns no storage itself — it holds handles to the repositories
//! (C1), the [`ContextEngine`] (C2), the [`Scheduler`] (C4), and the
//! [`Coordinator`] (C5), and composes them per action. Business rules that
//! span more than one of those layers (workload accounting on assignee
//! changes, state-machine gating on status updates, dependency cycle checks)
//! live here rather than in any one of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use orchestrator_context::ContextEngine;
use orchestrator_coordinator::Coordinator;
use orchestrator_core::{
    dependency_graph, state_machine, AgentRepository, BranchRepository, ConflictRepository,
    ContextPatch, DelegationRepository, DelegationStatus, DependencyRepository, DependencyType, ErrorKind, HealthRepository,
    Importance, NewAgent, NewBranch, NewProject, NewSubtask, NewTask, OrchestratorError,
    ProjectRepository, Result, SubtaskRepository, Task, TaskFilter, TaskRepository, TaskStatus, Tier,
    TriggerType, UpdateAgent, UpdateBranch, UpdateProject, UpdateSubtask, UpdateTask,
};
use orchestrator_scheduler::{progress, Scheduler};

/// Short window during which a repeated mutating call carrying the same
/// `idempotency_key` returns the cached result instead of re-executing.
const IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_guidance: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

impl Envelope {
    fn ok(request_id: String, operation: String, data: Value, workflow_guidance: Option<Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Meta { request_id, timestamp: Utc::now(), operation, workflow_guidance },
        }
    }

    fn err(request_id: String, operation: String, error: OrchestratorError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody { kind: error.kind(), message: error.to_string() }),
            meta: Meta { request_id, timestamp: Utc::now(), operation, workflow_guidance: None },
        }
    }

    /// Built directly by a transport when a request never made it far enough
    /// to identify a `tool`/`action` pair to route on.
    pub fn malformed(message: String) -> Self {
        Self::err(Uuid::new_v4().to_string(), "unknown".to_string(), OrchestratorError::invalid(message))
    }
}

fn parse<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| OrchestratorError::invalid(format!("invalid arguments: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| OrchestratorError::internal(e.to_string()))
}

fn default_dep_type() -> DependencyType {
    DependencyType::Blocks
}

pub struct Facade {
    projects: Arc<dyn ProjectRepository>,
    branches: Arc<dyn BranchRepository>,
    tasks: Arc<dyn TaskRepository>,
    subtasks: Arc<dyn SubtaskRepository>,
    dependencies: Arc<dyn DependencyRepository>,
    agents: Arc<dyn AgentRepository>,
    conflicts: Arc<dyn ConflictRepository>,
    health: Arc<dyn HealthRepository>,
    context: Arc<ContextEngine>,
    scheduler: Arc<Scheduler>,
    coordinator: Arc<Coordinator>,
    idempotency: Mutex<HashMap<String, (Instant, Value)>>,
    reopen_grace_seconds: i64,
}

impl Facade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        branches: Arc<dyn BranchRepository>,
        tasks: Arc<dyn TaskRepository>,
        subtasks: Arc<dyn SubtaskRepository>,
        dependencies: Arc<dyn DependencyRepository>,
        agents: Arc<dyn AgentRepository>,
        conflicts: Arc<dyn ConflictRepository>,
        health: Arc<dyn HealthRepository>,
        context: Arc<ContextEngine>,
        scheduler: Arc<Scheduler>,
        coordinator: Arc<Coordinator>,
        reopen_grace_seconds: i64,
    ) -> Self {
        Self {
            projects,
            branches,
            tasks,
            subtasks,
            dependencies,
            agents,
            conflicts,
            health,
            context,
            scheduler,
            coordinator,
            idempotency: Mutex::new(HashMap::new()),
            reopen_grace_seconds,
        }
    }

    pub async fn dispatch(&self, tool: &str, action: &str, arguments: Value) -> Envelope {
        let operation = format!("{tool}.{action}");
        let request_id = Uuid::new_v4().to_string();
        match self.route(tool, action, arguments).await {
            Ok((data, workflow_guidance)) => Envelope::ok(request_id, operation, data, workflow_guidance),
            Err(error) => Envelope::err(request_id, operation, error),
        }
    }

    async fn route(&self, tool: &str, action: &str, arguments: Value) -> Result<(Value, Option<Value>)> {
        match tool {
            "manage_project" => self.manage_project(action, arguments).await.map(|d| (d, None)),
            "manage_git_branch" => self.manage_git_branch(action, arguments).await.map(|d| (d, None)),
            "manage_task" => self.manage_task(action, arguments).await,
            "manage_subtask" => self.manage_subtask(action, arguments).await.map(|d| (d, None)),
            "manage_agent" => self.manage_agent(action, arguments).await.map(|d| (d, None)),
            "manage_context" => self.manage_context(action, arguments).await.map(|d| (d, None)),
            "manage_connection" => self.manage_connection(action, arguments).await.map(|d| (d, None)),
            "manage_compliance" => self.manage_compliance(action, arguments).await.map(|d| (d, None)),
            other => Err(OrchestratorError::invalid(format!("unknown tool '{other}'"))),
        }
    }

    fn idempotency_get(&self, key: &str) -> Option<Value> {
        let mut map = self.idempotency.lock().unwrap();
        map.retain(|_, (at, _)| at.elapsed() < IDEMPOTENCY_WINDOW);
        map.get(key).map(|(_, v)| v.clone())
    }

    fn idempotency_put(&self, key: &str, value: Value) {
        self.idempotency.lock().unwrap().insert(key.to_string(), (Instant::now(), value));
    }

    async fn idempotent<F>(&self, arguments: &Value, fut: F) -> Result<Value>
    where
        F: std::future::Future<Output = Result<Value>>,
    {
        let key = arguments.get("idempotency_key").and_then(|v| v.as_str()).map(str::to_string);
        if let Some(key) = &key {
            if let Some(cached) = self.idempotency_get(key) {
                return Ok(cached);
            }
        }
        let result = fut.await?;
        if let Some(key) = key {
            self.idempotency_put(&key, result.clone());
        }
        Ok(result)
    }

    // ---- manage_project ----

    async fn manage_project(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "create" => {
                self.idempotent(&arguments, async {
                    let new_project: NewProject = parse(arguments.clone())?;
                    to_json(&self.projects.create(new_project).await?)
                })
                .await
            }
            "list" => {
                #[derive(Deserialize, Default)]
                struct P {
                    user_id: Option<String>,
                }
                let p: P = parse(arguments)?;
                to_json(&self.projects.list(p.user_id.as_deref()).await?)
            }
            "get" => {
                #[derive(Deserialize)]
                struct P {
                    id: i64,
                }
                let p: P = parse(arguments)?;
                let project = self.projects.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("project", p.id))?;
                to_json(&project)
            }
            "update" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                        #[serde(flatten)]
                        patch: UpdateProject,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.projects.update(p.id, p.patch).await?)
                })
                .await
            }
            "archive" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                    }
                    let p: P = parse(arguments.clone())?;
                    let patch = UpdateProject { status: Some(orchestrator_core::ProjectStatus::Archived), ..Default::default() };
                    to_json(&self.projects.update(p.id, patch).await?)
                })
                .await
            }
            "delete" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                    }
                    let p: P = parse(arguments.clone())?;
                    self.projects.delete(p.id).await?;
                    Ok(json!({ "deleted": true }))
                })
                .await
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_project action '{other}'"))),
        }
    }

    // ---- manage_git_branch ----

    async fn manage_git_branch(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "create" => {
                self.idempotent(&arguments, async {
                    let new_branch: NewBranch = parse(arguments.clone())?;
                    to_json(&self.branches.create(new_branch).await?)
                })
                .await
            }
            "list" => {
                #[derive(Deserialize)]
                struct P {
                    project_id: i64,
                }
                let p: P = parse(arguments)?;
                to_json(&self.branches.list(p.project_id).await?)
            }
            "get" => {
                #[derive(Deserialize)]
                struct P {
                    id: i64,
                }
                let p: P = parse(arguments)?;
                let branch = self.branches.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("branch", p.id))?;
                to_json(&branch)
            }
            "update" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                        #[serde(flatten)]
                        patch: UpdateBranch,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.branches.update(p.id, p.patch).await?)
                })
                .await
            }
            "delete" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        project_id: i64,
                        id: i64,
                    }
                    let p: P = parse(arguments.clone())?;
                    let branch = self.branches.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("branch", p.id))?;
                    if branch.is_protected() {
                        return Err(OrchestratorError::forbidden("the 'main' branch cannot be deleted"));
                    }
                    let deleted_tasks = self.branches.delete(p.project_id, p.id).await?;
                    Ok(json!({ "deleted": true, "deleted_tasks": deleted_tasks }))
                })
                .await
            }
            "assign_agent" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        project_id: i64,
                        agent_id: String,
                        branch_id: i64,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.coordinator.assign_agent_to_branch(p.project_id, &p.agent_id, p.branch_id).await?)
                })
                .await
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_git_branch action '{other}'"))),
        }
    }

    // ---- manage_task ----

    async fn manage_task(&self, action: &str, arguments: Value) -> Result<(Value, Option<Value>)> {
        match action {
            "create" => {
                let data = self
                    .idempotent(&arguments, async {
                        let new_task: NewTask = parse(arguments.clone())?;
                        let branch = self
                            .branches
                            .get(new_task.branch_id)
                            .await?
                            .ok_or_else(|| OrchestratorError::not_found("branch", new_task.branch_id))?;
                        let assignees = new_task.assignees.clone();
                        let task = self.tasks.create(new_task).await?;
                        for agent_id in &assignees {
                            self.coordinator.on_assignee_added(branch.project_id, agent_id).await?;
                        }
                        to_json(&task)
                    })
                    .await?;
                Ok((data, None))
            }
            "list" => {
                let filter: TaskFilter = parse(arguments)?;
                Ok((to_json(&self.tasks.list(filter).await?)?, None))
            }
            "get" => {
                #[derive(Deserialize)]
                struct P {
                    id: i64,
                }
                let p: P = parse(arguments)?;
                let task = self.tasks.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("task", p.id))?;
                Ok((to_json(&task)?, None))
            }
            "update" => {
                let data = self.idempotent(&arguments, self.apply_task_update(arguments.clone())).await?;
                Ok((data, None))
            }
            "next" => {
                #[derive(Deserialize, Default)]
                struct P {
                    branch_id: i64,
                    requesting_agent: Option<String>,
                    #[serde(default = "default_true")]
                    include_context: bool,
                }
                fn default_true() -> bool {
                    true
                }
                let p: P = parse(arguments)?;
                let outcome = self.scheduler.next_task(p.branch_id, p.requesting_agent.as_deref(), p.include_context).await?;
                let guidance = match &outcome {
                    orchestrator_scheduler::NextTaskOutcome::Found(candidate) => Some(to_json(&candidate.workflow_guidance)?),
                    orchestrator_scheduler::NextTaskOutcome::NotFound(_) => None,
                };
                Ok((to_json(&outcome)?, guidance))
            }
            "complete" => {
                let data = self
                    .idempotent(&arguments, async {
                        #[derive(Deserialize)]
                        struct P {
                            id: i64,
                            completion_summary: String,
                            testing_notes: Option<String>,
                            #[serde(default)]
                            force: bool,
                            completed_by: Option<String>,
                        }
                        let p: P = parse(arguments.clone())?;
                        let before = self.tasks.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("task", p.id))?;
                        let source_agent = p.completed_by.clone().or_else(|| before.assignees.iter().next().cloned()).unwrap_or_else(|| "system".to_string());
                        let task = self.tasks.complete(p.id, p.completion_summary.clone(), p.testing_notes, p.force).await?;
                        self.context
                            .add_insight(
                                Tier::Task(task.id),
                                p.completion_summary,
                                "completion".to_string(),
                                Importance::Medium,
                                1.0,
                                source_agent,
                                Some(task.id),
                            )
                            .await?;
                        if let Some(branch) = self.branches.get(before.branch_id).await? {
                            for agent_id in &before.assignees {
                                let _ = self.coordinator.on_assignee_removed(branch.project_id, agent_id).await;
                            }
                        }
                        to_json(&task)
                    })
                    .await?;
                Ok((data, None))
            }
            "search" => {
                #[derive(Deserialize)]
                struct P {
                    query: String,
                    branch_id: Option<i64>,
                    limit: Option<u32>,
                }
                let p: P = parse(arguments)?;
                let filter = TaskFilter { branch_id: p.branch_id, ..Default::default() };
                let query = p.query.to_lowercase();
                let mut matches: Vec<Task> = self
                    .tasks
                    .list(filter)
                    .await?
                    .into_iter()
                    .filter(|t| t.title.to_lowercase().contains(&query) || t.description.to_lowercase().contains(&query))
                    .collect();
                if let Some(limit) = p.limit {
                    matches.truncate(limit as usize);
                }
                Ok((to_json(&matches)?, None))
            }
            "add_dependency" => {
                let data = self
                    .idempotent(&arguments, async {
                        #[derive(Deserialize)]
                        struct P {
                            task_id: i64,
                            depends_on: i64,
                            #[serde(default = "default_dep_type")]
                            dep_type: DependencyType,
                        }
                        let p: P = parse(arguments.clone())?;
                        let task = self.tasks.get(p.task_id).await?.ok_or_else(|| OrchestratorError::not_found("task", p.task_id))?;
                        let prerequisite = self.tasks.get(p.depends_on).await?.ok_or_else(|| OrchestratorError::not_found("task", p.depends_on))?;
                        let branch = self
                            .branches
                            .get(task.branch_id)
                            .await?
                            .ok_or_else(|| OrchestratorError::not_found("branch", task.branch_id))?;
                        let edges = self.dependencies.list_for_project(branch.project_id).await?;
                        let mut forward: std::collections::HashMap<i64, std::collections::HashSet<i64>> = std::collections::HashMap::new();
                        for edge in edges {
                            forward.entry(edge.task_id).or_default().insert(edge.depends_on_task_id);
                        }
                        if dependency_graph::would_create_cycle(&forward, p.task_id, p.depends_on) {
                            return Err(OrchestratorError::cycle(format!(
                                "adding dependency {} -> {} would create a cycle",
                                p.task_id, p.depends_on
                            )));
                        }
                        let cross_branch = task.branch_id != prerequisite.branch_id;
                        if cross_branch {
                            self.dependencies.add_cross_branch(p.task_id, p.depends_on, p.dep_type).await?;
                        } else {
                            self.dependencies.add(p.task_id, p.depends_on, p.dep_type).await?;
                        }
                        Ok(json!({ "added": true, "cross_branch": cross_branch }))
                    })
                    .await?;
                Ok((data, None))
            }
            "remove_dependency" => {
                let data = self
                    .idempotent(&arguments, async {
                        #[derive(Deserialize)]
                        struct P {
                            task_id: i64,
                            depends_on: i64,
                        }
                        let p: P = parse(arguments.clone())?;
                        self.dependencies.remove(p.task_id, p.depends_on).await?;
                        Ok(json!({ "removed": true }))
                    })
                    .await?;
                Ok((data, None))
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_task action '{other}'"))),
        }
    }

    /// Shared by `manage_task action=update`: validates the status
    /// transition (including the grace-windowed `done -> todo` reopen) and
    /// reconciles agent workload when `assignees` changes.
    async fn apply_task_update(&self, arguments: Value) -> Result<Value> {
        #[derive(Deserialize)]
        struct P {
            id: i64,
            #[serde(flatten)]
            patch: UpdateTask,
        }
        let p: P = parse(arguments)?;
        let current = self.tasks.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("task", p.id))?;

        if let Some(new_status) = p.patch.status {
            if new_status != current.status {
                let allowed = if current.status == TaskStatus::Done && new_status == TaskStatus::Todo {
                    let within_grace = current
                        .completed_at
                        .map(|at| (Utc::now() - at).num_seconds() <= self.reopen_grace_seconds)
                        .unwrap_or(false);
                    state_machine::can_reopen(current.status, within_grace)
                } else {
                    state_machine::can_transition(current.status, new_status)
                };
                if !allowed {
                    return Err(OrchestratorError::conflict(format!(
                        "task {} cannot move from {:?} to {new_status:?}",
                        p.id, current.status
                    )));
                }
            }
        }

        if let Some(branch) = self.branches.get(current.branch_id).await? {
            if let Some(new_assignees) = &p.patch.assignees {
                for added in new_assignees.difference(&current.assignees) {
                    self.coordinator.on_assignee_added(branch.project_id, added).await?;
                }
                for removed in current.assignees.difference(new_assignees) {
                    let _ = self.coordinator.on_assignee_removed(branch.project_id, removed).await;
                }
            }
        }

        to_json(&self.tasks.update(p.id, p.patch).await?)
    }

    // ---- manage_subtask ----

    async fn manage_subtask(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "create" => {
                self.idempotent(&arguments, async {
                    let new_subtask: NewSubtask = parse(arguments.clone())?;
                    let task_id = new_subtask.task_id;
                    let subtask = self.subtasks.create(new_subtask).await?;
                    let progress = self.sync_parent_progress(task_id).await?;
                    Ok(json!({ "subtask": subtask, "task_progress": progress }))
                })
                .await
            }
            "list" => {
                #[derive(Deserialize)]
                struct P {
                    task_id: i64,
                }
                let p: P = parse(arguments)?;
                to_json(&self.subtasks.list_by_task(p.task_id).await?)
            }
            "get" => {
                #[derive(Deserialize)]
                struct P {
                    id: i64,
                }
                let p: P = parse(arguments)?;
                let subtask = self.subtasks.get(p.id).await?.ok_or_else(|| OrchestratorError::not_found("subtask", p.id))?;
                to_json(&subtask)
            }
            "update" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                        #[serde(flatten)]
                        patch: UpdateSubtask,
                    }
                    let p: P = parse(arguments.clone())?;
                    let subtask = self.subtasks.update(p.id, p.patch).await?;
                    let progress = self.sync_parent_progress(subtask.task_id).await?;
                    Ok(json!({ "subtask": subtask, "task_progress": progress }))
                })
                .await
            }
            "complete" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                        completion_summary: String,
                    }
                    let p: P = parse(arguments.clone())?;
                    let subtask = self.subtasks.complete(p.id, p.completion_summary).await?;
                    let progress = self.sync_parent_progress(subtask.task_id).await?;
                    Ok(json!({ "subtask": subtask, "task_progress": progress }))
                })
                .await
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_subtask action '{other}'"))),
        }
    }

    async fn sync_parent_progress(&self, task_id: i64) -> Result<f64> {
        let subtasks = self.subtasks.list_by_task(task_id).await?;
        let aggregated = progress::aggregate_subtask_progress(&subtasks);
        let task = self.tasks.get(task_id).await?.ok_or_else(|| OrchestratorError::not_found("task", task_id))?;
        let any_in_progress = subtasks.iter().any(|s| s.status == TaskStatus::InProgress);
        if let Some(next) = progress::parent_status_transition(task.status, any_in_progress) {
            self.tasks.set_status(task_id, next).await?;
        }
        Ok(aggregated)
    }

    // ---- manage_agent ----

    async fn manage_agent(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "register" => {
                self.idempotent(&arguments, async {
                    let new_agent: NewAgent = parse(arguments.clone())?;
                    to_json(&self.coordinator.register_agent(new_agent).await?)
                })
                .await
            }
            "list" => {
                #[derive(Deserialize)]
                struct P {
                    project_id: i64,
                }
                let p: P = parse(arguments)?;
                to_json(&self.agents.list(p.project_id).await?)
            }
            "get" => {
                #[derive(Deserialize)]
                struct P {
                    project_id: i64,
                    id: String,
                }
                let p: P = parse(arguments)?;
                let agent = self.agents.get(p.project_id, &p.id).await?.ok_or_else(|| OrchestratorError::not_found("agent", &p.id))?;
                to_json(&agent)
            }
            "update" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        project_id: i64,
                        id: String,
                        #[serde(flatten)]
                        patch: UpdateAgent,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.coordinator.update_agent(p.project_id, &p.id, p.patch).await?)
                })
                .await
            }
            "assign" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        project_id: i64,
                        agent_id: String,
                        branch_id: i64,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.coordinator.assign_agent_to_branch(p.project_id, &p.agent_id, p.branch_id).await?)
                })
                .await
            }
            "rebalance" => {
                #[derive(Deserialize)]
                struct P {
                    project_id: i64,
                }
                let p: P = parse(arguments)?;
                to_json(&self.coordinator.rebalance(p.project_id).await?)
            }
            "unregister" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        project_id: i64,
                        id: String,
                    }
                    let p: P = parse(arguments.clone())?;
                    self.agents.unregister(p.project_id, &p.id).await?;
                    Ok(json!({ "unregistered": true }))
                })
                .await
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_agent action '{other}'"))),
        }
    }

    // ---- manage_context ----

    async fn manage_context(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "resolve" => {
                #[derive(Deserialize)]
                struct P {
                    #[serde(flatten)]
                    level: Tier,
                    #[serde(default)]
                    force_refresh: bool,
                }
                let p: P = parse(arguments)?;
                to_json(&self.context.resolve(p.level, p.force_refresh).await?)
            }
            "update" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        #[serde(flatten)]
                        level: Tier,
                        #[serde(flatten)]
                        patch: ContextPatch,
                        expected_version: Option<i64>,
                        #[serde(default)]
                        propagate: bool,
                    }
                    let p: P = parse(arguments.clone())?;
                    self.context.update(p.level, p.patch, p.expected_version, p.propagate).await?;
                    Ok(json!({ "updated": true }))
                })
                .await
            }
            "delegate" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        source_level: Tier,
                        target_level: Tier,
                        data: Value,
                        reason: String,
                        trigger_type: TriggerType,
                        created_by: String,
                    }
                    let p: P = parse(arguments.clone())?;
                    let id = self
                        .context
                        .delegate(p.source_level, p.target_level, p.data, p.reason, p.trigger_type, p.created_by)
                        .await?;
                    Ok(json!({ "delegation_id": id }))
                })
                .await
            }
            "add_insight" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        #[serde(flatten)]
                        level: Tier,
                        content: String,
                        category: String,
                        importance: Importance,
                        confidence: f64,
                        source_agent: String,
                        related_task_id: Option<i64>,
                    }
                    let p: P = parse(arguments.clone())?;
                    to_json(&self.context.add_insight(p.level, p.content, p.category, p.importance, p.confidence, p.source_agent, p.related_task_id).await?)
                })
                .await
            }
            "list_delegations" => {
                #[derive(Deserialize, Default)]
                struct P {
                    target_level: Option<Tier>,
                }
                let p: P = parse(arguments)?;
                to_json(&self.context.delegations().list(p.target_level).await?)
            }
            "list_insights" => {
                #[derive(Deserialize)]
                struct P {
                    #[serde(flatten)]
                    level: Tier,
                }
                let p: P = parse(arguments)?;
                to_json(&self.context.insights().list(p.level).await?)
            }
            "approve_delegation" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        id: i64,
                        approved: bool,
                        rejected_reason: Option<String>,
                        processed_by: Option<String>,
                    }
                    let p: P = parse(arguments.clone())?;
                    let status = if p.approved { DelegationStatus::Implemented } else { DelegationStatus::Rejected };
                    if p.approved {
                        let delegation = self
                            .context
                            .delegations()
                            .get(p.id)
                            .await?
                            .ok_or_else(|| OrchestratorError::not_found("delegation", p.id))?;
                        let patch = ContextPatch { data: Some(delegation.delegated_data), overrides: None, inheritance_disabled: None, force_local_only: None };
                        self.context.update(delegation.target_level, patch, None, true).await?;
                    }
                    to_json(&self.context.delegations().mark_processed(p.id, Some(p.approved), p.rejected_reason, status, p.processed_by).await?)
                })
                .await
            }
            "invalidate_cache" => {
                self.idempotent(&arguments, async {
                    #[derive(Deserialize)]
                    struct P {
                        #[serde(flatten)]
                        level: Tier,
                        reason: String,
                    }
                    let p: P = parse(arguments.clone())?;
                    self.context.invalidate(p.level, &p.reason).await?;
                    Ok(json!({ "invalidated": true }))
                })
                .await
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_context action '{other}'"))),
        }
    }

    // ---- manage_connection ----

    async fn manage_connection(&self, action: &str, _arguments: Value) -> Result<Value> {
        match action {
            "health_check" => {
                self.health.health_check().await?;
                let stats = self.health.get_stats().await?;
                to_json(&json!({ "healthy": true, "stats": stats }))
            }
            "capabilities" => Ok(json!({
                "tools": {
                    "manage_project": ["create", "list", "get", "update", "archive", "delete"],
                    "manage_git_branch": ["create", "list", "get", "update", "delete", "assign_agent"],
                    "manage_task": ["create", "list", "get", "update", "next", "complete", "search", "add_dependency", "remove_dependency"],
                    "manage_subtask": ["create", "list", "get", "update", "complete"],
                    "manage_agent": ["register", "list", "get", "update", "assign", "rebalance", "unregister"],
                    "manage_context": ["resolve", "update", "delegate", "add_insight", "list_insights", "list_delegations", "approve_delegation", "invalidate_cache"],
                    "manage_connection": ["health_check", "capabilities"],
                    "manage_compliance": ["validate_compliance", "get_audit_trail"],
                },
            })),
            other => Err(OrchestratorError::invalid(format!("unknown manage_connection action '{other}'"))),
        }
    }

    // ---- manage_compliance ----

    async fn manage_compliance(&self, action: &str, arguments: Value) -> Result<Value> {
        match action {
            "validate_compliance" => {
                #[derive(Deserialize, Default)]
                struct P {
                    project_id: Option<i64>,
                }
                let p: P = parse(arguments)?;
                let project_ids = match p.project_id {
                    Some(id) => vec![id],
                    None => self.projects.list(None).await?.into_iter().map(|proj| proj.id).collect(),
                };

                let mut violations = Vec::new();
                for project_id in &project_ids {
                    for branch in self.branches.list(*project_id).await? {
                        let tasks = self.tasks.list_by_branch(branch.id).await?;
                        let completed = tasks.iter().filter(|t| t.status == TaskStatus::Done).count() as i64;
                        if branch.task_count != tasks.len() as i64 || branch.completed_task_count != completed {
                            violations.push(json!({
                                "invariant": "P1",
                                "branch_id": branch.id,
                                "detail": format!(
                                    "branch {} reports task_count={} completed_task_count={} but actual counts are {} / {}",
                                    branch.id, branch.task_count, branch.completed_task_count, tasks.len(), completed
                                ),
                            }));
                        }
                    }

                    let edges = self.dependencies.list_for_project(*project_id).await?;
                    let mut forward: std::collections::HashMap<i64, std::collections::HashSet<i64>> = std::collections::HashMap::new();
                    for edge in edges {
                        forward.entry(edge.task_id).or_default().insert(edge.depends_on_task_id);
                    }
                    if let Some(cycle) = dependency_graph::find_cycle(&forward) {
                        violations.push(json!({ "invariant": "P2", "project_id": project_id, "cycle": cycle }));
                    }

                    for agent in self.agents.list(*project_id).await? {
                        if agent.current_workload > agent.max_concurrent_tasks {
                            violations.push(json!({
                                "invariant": "P6",
                                "agent_id": agent.id,
                                "detail": format!("workload {} exceeds capacity {}", agent.current_workload, agent.max_concurrent_tasks),
                            }));
                        }
                    }
                }

                Ok(json!({ "checked_projects": project_ids.len(), "violations": violations }))
            }
            "get_audit_trail" => {
                #[derive(Deserialize)]
                struct P {
                    project_id: i64,
                    limit: Option<u32>,
                }
                let p: P = parse(arguments)?;
                let delegation_repo = self.context.delegations();
                let mut delegations = delegation_repo.list(Some(Tier::Global)).await?;
                delegations.extend(delegation_repo.list(Some(Tier::Project(p.project_id))).await?);
                for branch in self.branches.list(p.project_id).await? {
                    delegations.extend(delegation_repo.list(Some(Tier::Branch(branch.id))).await?);
                    for task in self.tasks.list_by_branch(branch.id).await? {
                        delegations.extend(delegation_repo.list(Some(Tier::Task(task.id))).await?);
                    }
                }
                delegations.sort_by_key(|d| d.created_at);
                if let Some(limit) = p.limit {
                    delegations.truncate(limit as usize);
                }
                let conflicts = self.conflicts.list_unresolved().await?;
                Ok(json!({ "delegations": delegations, "unresolved_conflicts": conflicts }))
            }
            other => Err(OrchestratorError::invalid(format!("unknown manage_compliance action '{other}'"))),
        }
    }
}
