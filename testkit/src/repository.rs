//! Mock implementations of the repository traits (C1)
//!
//! Each mock is a thread-safe in-memory store with:
//! - Error injection for failure-path testing
//! - Call history tracking for verification
//! - Behavior close enough to the SQLite implementation to exercise the
//!   layers above it (facade, scheduler, coordinator) without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use orchestrator_core::{
    Agent, AgentRepository, NewAgent, NewProject, NewTask, OrchestratorError, Project,
    ProjectRepository, Result, Task, TaskFilter, TaskRepository, TaskStatus, UpdateAgent,
    UpdateProject, UpdateTask,
};

/// Mock implementation of `TaskRepository` for testing
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<i64, Task>>>,
    next_id: Arc<AtomicI64>,
    error_injection: Arc<Mutex<Option<OrchestratorError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let mut max_id = 0;
        let mut map = HashMap::new();
        for task in tasks {
            max_id = max_id.max(task.id);
            map.insert(task.id, task);
        }
        Self {
            tasks: Arc::new(Mutex::new(map)),
            next_id: Arc::new(AtomicI64::new(max_id + 1)),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. Call history: {:?}",
            *history
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record(&self, method: &str, params: &str) {
        self.call_history.lock().push(format!("{method}({params})"));
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, new_task: NewTask) -> Result<Task> {
        self.record("create", &format!("title={}", new_task.title));
        self.check_error_injection()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let task = Task {
            id,
            branch_id: new_task.branch_id,
            title: new_task.title,
            description: new_task.description,
            status: TaskStatus::Todo,
            priority: new_task.priority,
            details: String::new(),
            estimated_effort: new_task.estimated_effort,
            due_date: new_task.due_date,
            context_id: None,
            assignees: new_task.assignees,
            labels: new_task.labels,
            dependencies: new_task.dependencies,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.tasks.lock().insert(id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: i64) -> Result<Option<Task>> {
        self.record("get", &format!("id={id}"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record("list", "");
        self.check_error_injection()?;

        let tasks = self.tasks.lock();
        let mut result: Vec<Task> = tasks
            .values()
            .filter(|task| {
                if let Some(branch_id) = filter.branch_id {
                    if task.branch_id != branch_id {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if task.status != status {
                        return false;
                    }
                }
                if let Some(ref assignee) = filter.assignee {
                    if !task.assignees.contains(assignee) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(offset) = filter.offset {
            if offset as usize >= result.len() {
                return Ok(Vec::new());
            }
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn list_by_branch(&self, branch_id: i64) -> Result<Vec<Task>> {
        self.record("list_by_branch", &format!("branch_id={branch_id}"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().values().filter(|t| t.branch_id == branch_id).cloned().collect())
    }

    async fn update(&self, id: i64, patch: UpdateTask) -> Result<Task> {
        self.record("update", &format!("id={id}"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("task", id))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assignees) = patch.assignees {
            task.assignees = assignees;
        }
        if let Some(labels) = patch.labels {
            task.labels = labels;
        }
        if let Some(dependencies) = patch.dependencies {
            task.dependencies = dependencies;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<Task> {
        self.record("set_status", &format!("id={id}, status={status}"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("task", id))?;
        task.status = status;
        task.updated_at = Utc::now();
        if status.is_terminal() {
            task.completed_at = Some(Utc::now());
        }
        Ok(task.clone())
    }

    async fn complete(
        &self,
        id: i64,
        _completion_summary: String,
        _testing_notes: Option<String>,
        _force: bool,
    ) -> Result<Task> {
        self.record("complete", &format!("id={id}"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("task", id))?;
        task.status = TaskStatus::Done;
        task.completed_at = Some(Utc::now());
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.record("delete", &format!("id={id}"));
        self.check_error_injection()?;
        self.tasks.lock().remove(&id).ok_or_else(|| OrchestratorError::not_found("task", id))?;
        Ok(())
    }
}

/// Mock implementation of `ProjectRepository` for testing
pub struct MockProjectRepository {
    projects: Arc<Mutex<HashMap<i64, Project>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for MockProjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProjectRepository {
    pub fn new() -> Self {
        Self { projects: Arc::new(Mutex::new(HashMap::new())), next_id: Arc::new(AtomicI64::new(1)) }
    }
}

#[async_trait]
impl ProjectRepository for MockProjectRepository {
    async fn create(&self, new_project: NewProject) -> Result<Project> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let project = Project {
            id,
            name: new_project.name,
            description: new_project.description,
            status: orchestrator_core::ProjectStatus::Active,
            user_id: new_project.user_id,
            created_at: now,
            updated_at: now,
            metadata: new_project.metadata,
        };
        self.projects.lock().insert(id, project.clone());
        Ok(project)
    }

    async fn get(&self, id: i64) -> Result<Option<Project>> {
        Ok(self.projects.lock().get(&id).cloned())
    }

    async fn get_by_name(&self, user_id: &str, name: &str) -> Result<Option<Project>> {
        Ok(self.projects.lock().values().find(|p| p.user_id == user_id && p.name == name).cloned())
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .values()
            .filter(|p| match user_id {
                Some(uid) => p.user_id == uid,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, patch: UpdateProject) -> Result<Project> {
        let mut projects = self.projects.lock();
        let project = projects.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("project", id))?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        if let Some(metadata) = patch.metadata {
            project.metadata = metadata;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.projects.lock().remove(&id).ok_or_else(|| OrchestratorError::not_found("project", id))?;
        Ok(())
    }

    async fn branch_count(&self, _id: i64) -> Result<i64> {
        Ok(0)
    }
}

/// Mock implementation of `AgentRepository` for testing
pub struct MockAgentRepository {
    agents: Arc<Mutex<HashMap<(i64, String), Agent>>>,
}

impl Default for MockAgentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgentRepository {
    pub fn new() -> Self {
        Self { agents: Arc::new(Mutex::new(HashMap::new())) }
    }
}

#[async_trait]
impl AgentRepository for MockAgentRepository {
    async fn register(&self, new_agent: NewAgent) -> Result<Agent> {
        let now = Utc::now();
        let agent = Agent {
            id: new_agent.id.clone(),
            project_id: new_agent.project_id,
            name: new_agent.name,
            description: new_agent.description,
            call_agent: new_agent.call_agent,
            capabilities: new_agent.capabilities,
            specializations: new_agent.specializations,
            status: orchestrator_core::AgentAvailability::Available,
            max_concurrent_tasks: new_agent.max_concurrent_tasks,
            current_workload: 0,
            completed_tasks: 0,
            success_rate: 1.0,
            created_at: now,
            updated_at: now,
        };
        self.agents.lock().insert((new_agent.project_id, new_agent.id), agent.clone());
        Ok(agent)
    }

    async fn get(&self, project_id: i64, id: &str) -> Result<Option<Agent>> {
        Ok(self.agents.lock().get(&(project_id, id.to_string())).cloned())
    }

    async fn list(&self, project_id: i64) -> Result<Vec<Agent>> {
        Ok(self.agents.lock().values().filter(|a| a.project_id == project_id).cloned().collect())
    }

    async fn update(&self, project_id: i64, id: &str, patch: UpdateAgent) -> Result<Agent> {
        let mut agents = self.agents.lock();
        let agent = agents
            .get_mut(&(project_id, id.to_string()))
            .ok_or_else(|| OrchestratorError::not_found("agent", id))?;
        if let Some(name) = patch.name {
            agent.name = name;
        }
        if let Some(description) = patch.description {
            agent.description = description;
        }
        if let Some(capabilities) = patch.capabilities {
            agent.capabilities = capabilities;
        }
        if let Some(specializations) = patch.specializations {
            agent.specializations = specializations;
        }
        if let Some(status) = patch.status {
            agent.status = status;
        }
        if let Some(max_concurrent_tasks) = patch.max_concurrent_tasks {
            agent.max_concurrent_tasks = max_concurrent_tasks;
        }
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    async fn unregister(&self, project_id: i64, id: &str) -> Result<()> {
        self.agents
            .lock()
            .remove(&(project_id, id.to_string()))
            .ok_or_else(|| OrchestratorError::not_found("agent", id))?;
        Ok(())
    }

    async fn adjust_workload(&self, project_id: i64, id: &str, delta: i32) -> Result<Agent> {
        let mut agents = self.agents.lock();
        let agent = agents
            .get_mut(&(project_id, id.to_string()))
            .ok_or_else(|| OrchestratorError::not_found("agent", id))?;
        let new_workload = agent.current_workload + delta;
        if new_workload > agent.max_concurrent_tasks {
            return Err(OrchestratorError::capacity(format!(
                "agent '{id}' cannot take on more work: at {new_workload}/{}",
                agent.max_concurrent_tasks
            )));
        }
        agent.current_workload = new_workload.max(0);
        Ok(agent.clone())
    }

    async fn assign_to_branch(
        &self,
        project_id: i64,
        agent_id: &str,
        branch_id: i64,
    ) -> Result<orchestrator_core::AgentBranchAssignment> {
        Ok(orchestrator_core::AgentBranchAssignment {
            project_id,
            agent_id: agent_id.to_string(),
            branch_id,
            assigned_at: Utc::now(),
        })
    }

    async fn list_branch_assignments(
        &self,
        _project_id: i64,
    ) -> Result<Vec<orchestrator_core::AgentBranchAssignment>> {
        Ok(Vec::new())
    }
}
