//! End-to-end scenario tests (seed tests A-F) run against a fresh
//! in-memory database per test, driven entirely through the Tool Dispatch
//! Facade the same way a transport would.

use std::sync::Arc;

use orchestrator_server::{Config, Envelope, Facade};
use serde_json::{json, Value};

async fn facade() -> Arc<Facade> {
    let mut config = Config::default();
    config.database.url = Some("sqlite::memory:".to_string());
    orchestrator_server::initialize_app(&config).await.expect("facade should initialize against :memory:")
}

fn data(envelope: &Envelope) -> &Value {
    assert!(envelope.success, "expected success, got error: {:?}", envelope.error);
    envelope.data.as_ref().expect("successful envelope should carry data")
}

fn id_of(value: &Value) -> i64 {
    value.get("id").and_then(Value::as_i64).expect("value should carry an integer id")
}

async fn create_project(facade: &Facade) -> i64 {
    let envelope = facade
        .dispatch(
            "manage_project",
            "create",
            json!({ "name": "Scenario Project", "description": "seed test project", "user_id": "scenario-user" }),
        )
        .await;
    id_of(data(&envelope))
}

async fn create_branch(facade: &Facade, project_id: i64) -> i64 {
    let envelope = facade
        .dispatch(
            "manage_git_branch",
            "create",
            json!({ "project_id": project_id, "name": "feature-branch", "description": "seed test branch" }),
        )
        .await;
    id_of(data(&envelope))
}

/// Scenario A: Next-task gating (SPEC_FULL.md §8).
///
/// T1 (priority=high) has no dependencies and is selected first; T2
/// (priority=urgent) depends on T1 and is passed over until T1 completes.
#[tokio::test]
async fn scenario_a_next_task_gating() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;

    let t1 = id_of(data(
        &facade
            .dispatch(
                "manage_task",
                "create",
                json!({ "branch_id": branch_id, "title": "T1", "description": "first task", "priority": "high" }),
            )
            .await,
    ));
    let t2 = id_of(data(
        &facade
            .dispatch(
                "manage_task",
                "create",
                json!({ "branch_id": branch_id, "title": "T2", "description": "second task", "priority": "urgent" }),
            )
            .await,
    ));
    let added = facade
        .dispatch("manage_task", "add_dependency", json!({ "task_id": t2, "depends_on": t1 }))
        .await;
    assert!(added.success);

    let outcome = data(&facade.dispatch("manage_task", "next", json!({ "branch_id": branch_id })).await).clone();
    let found = outcome.get("Found").expect("T1 should be ready despite T2's higher priority");
    assert_eq!(id_of(&found["task"]), t1);

    let completed = facade
        .dispatch(
            "manage_task",
            "complete",
            json!({ "id": t1, "completion_summary": "shipped the first task", "testing_notes": null, "force": false }),
        )
        .await;
    assert!(completed.success, "completing T1 should succeed: {:?}", completed.error);

    let outcome = data(&facade.dispatch("manage_task", "next", json!({ "branch_id": branch_id })).await).clone();
    let found = outcome.get("Found").expect("T2 should now be unblocked");
    assert_eq!(id_of(&found["task"]), t2);

    let insights = data(&facade.dispatch("manage_context", "list_insights", json!({ "level": "task", "id": t1 })).await).clone();
    let insights = insights.as_array().expect("list_insights should return an array");
    assert!(
        insights.iter().any(|i| i["category"] == "completion" && i["content"] == "shipped the first task"),
        "completing a task should record its completion summary as a task-tier insight: {insights:?}"
    );
}

/// Scenario B: cache invalidation on project update.
///
/// A project-level preference resolves down to a task; updating the
/// project with `propagate=true` changes what the next resolve sees.
#[tokio::test]
async fn scenario_b_cache_invalidation_on_project_update() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;
    let task_id = id_of(data(
        &facade
            .dispatch(
                "manage_task",
                "create",
                json!({ "branch_id": branch_id, "title": "T1", "description": "leaf task" }),
            )
            .await,
    ));

    let set = facade
        .dispatch(
            "manage_context",
            "update",
            json!({
                "level": "project", "id": project_id,
                "data": { "team_preferences": { "default_priority": "medium" } },
                "propagate": true
            }),
        )
        .await;
    assert!(set.success, "setting project preference should succeed: {:?}", set.error);

    let resolved = data(&facade.dispatch("manage_context", "resolve", json!({ "level": "task", "id": task_id })).await).clone();
    assert_eq!(resolved["resolved_context"]["team_preferences"]["default_priority"], json!("medium"));

    let update = facade
        .dispatch(
            "manage_context",
            "update",
            json!({
                "level": "project", "id": project_id,
                "data": { "team_preferences": { "default_priority": "high" } },
                "propagate": true
            }),
        )
        .await;
    assert!(update.success, "updating project preference should succeed: {:?}", update.error);

    let resolved = data(&facade.dispatch("manage_context", "resolve", json!({ "level": "task", "id": task_id })).await).clone();
    assert_eq!(
        resolved["resolved_context"]["team_preferences"]["default_priority"],
        json!("high"),
        "propagated update should invalidate the stale cache entry and recompute"
    );
}

/// Scenario C: delegation upward merge.
///
/// A pattern discovered at a task is delegated to its project. Its trigger
/// type (`manual`) leaves it pending for a human to approve rather than
/// auto-merging; once approved through the facade, the project (and its
/// cached task entries) reflect the merged data.
#[tokio::test]
async fn scenario_c_delegation_upward_merge() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;
    let task_id = id_of(data(
        &facade
            .dispatch(
                "manage_task",
                "create",
                json!({ "branch_id": branch_id, "title": "T1", "description": "auth work" }),
            )
            .await,
    ));

    // Warm the task-level cache entry that the merge must invalidate.
    let _ = facade.dispatch("manage_context", "resolve", json!({ "level": "project", "id": project_id })).await;

    let delegate = facade
        .dispatch(
            "manage_context",
            "delegate",
            json!({
                "source_level": { "level": "task", "id": task_id },
                "target_level": { "level": "project", "id": project_id },
                "data": { "patterns": { "auth": "JWT" } },
                "reason": "discovered a reusable auth pattern",
                "trigger_type": "manual",
                "created_by": "scenario-agent"
            }),
        )
        .await;
    assert!(delegate.success, "delegate should succeed: {:?}", delegate.error);
    let delegation_id = data(&delegate)["delegation_id"].as_i64().expect("delegate should return a delegation_id");

    let pending = data(&facade.dispatch("manage_context", "list_delegations", json!({ "target_level": { "level": "project", "id": project_id } })).await).clone();
    let pending = pending.as_array().expect("list_delegations should return an array");
    assert!(
        pending.iter().any(|d| d["id"].as_i64() == Some(delegation_id) && !d["processed"].as_bool().unwrap_or(true)),
        "delegation should be pending manual approval, not auto-merged"
    );

    let resolved_before = data(&facade.dispatch("manage_context", "resolve", json!({ "level": "project", "id": project_id })).await).clone();
    assert!(
        resolved_before["resolved_context"].get("patterns").is_none(),
        "an unapproved delegation must not be merged yet"
    );

    let approved = facade
        .dispatch(
            "manage_context",
            "approve_delegation",
            json!({ "id": delegation_id, "approved": true, "rejected_reason": null, "processed_by": "scenario-reviewer" }),
        )
        .await;
    assert!(approved.success, "approving the delegation should succeed: {:?}", approved.error);

    let resolved = data(&facade.dispatch("manage_context", "resolve", json!({ "level": "project", "id": project_id })).await).clone();
    assert_eq!(resolved["resolved_context"]["patterns"]["auth"], json!("JWT"));
}

/// Scenario D: adding a dependency that would close a cycle is rejected.
#[tokio::test]
async fn scenario_d_dependency_cycle_rejected() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;

    let mut ids = Vec::new();
    for title in ["T1", "T2", "T3"] {
        let id = id_of(data(
            &facade
                .dispatch(
                    "manage_task",
                    "create",
                    json!({ "branch_id": branch_id, "title": title, "description": "cycle test task" }),
                )
                .await,
        ));
        ids.push(id);
    }
    let (t1, t2, t3) = (ids[0], ids[1], ids[2]);

    for (dependent, prerequisite) in [(t2, t1), (t3, t2)] {
        let added = facade
            .dispatch("manage_task", "add_dependency", json!({ "task_id": dependent, "depends_on": prerequisite }))
            .await;
        assert!(added.success, "chain edge should be accepted: {:?}", added.error);
    }

    let closing = facade.dispatch("manage_task", "add_dependency", json!({ "task_id": t1, "depends_on": t3 })).await;
    assert!(!closing.success, "closing the cycle should be rejected");
    assert_eq!(closing.error.unwrap().kind, orchestrator_core::ErrorKind::Cycle);
}

/// A dependency between tasks on different branches of the same project is
/// recorded as a cross-branch edge, still gates readiness and completion,
/// and still participates in project-wide cycle detection.
#[tokio::test]
async fn scenario_cross_branch_dependency_gates_readiness_and_completion() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_a = create_branch(&facade, project_id).await;
    let branch_b = id_of(data(
        &facade
            .dispatch(
                "manage_git_branch",
                "create",
                json!({ "project_id": project_id, "name": "other-branch", "description": "second branch" }),
            )
            .await,
    ));

    let upstream = id_of(data(
        &facade
            .dispatch("manage_task", "create", json!({ "branch_id": branch_a, "title": "Upstream", "description": "lives on branch A" }))
            .await,
    ));
    let downstream = id_of(data(
        &facade
            .dispatch("manage_task", "create", json!({ "branch_id": branch_b, "title": "Downstream", "description": "lives on branch B" }))
            .await,
    ));

    let added = facade
        .dispatch("manage_task", "add_dependency", json!({ "task_id": downstream, "depends_on": upstream }))
        .await;
    assert!(added.success, "cross-branch dependency should be accepted: {:?}", added.error);
    assert_eq!(data(&added)["cross_branch"], json!(true));

    // Closing the cycle the other way (even via a different branch) is still rejected.
    let cycle = facade.dispatch("manage_task", "add_dependency", json!({ "task_id": upstream, "depends_on": downstream })).await;
    assert!(!cycle.success, "a cross-branch cycle should be rejected");
    assert_eq!(cycle.error.unwrap().kind, orchestrator_core::ErrorKind::Cycle);

    let outcome = data(&facade.dispatch("manage_task", "next", json!({ "branch_id": branch_b })).await).clone();
    assert!(outcome.get("NotFound").is_some(), "downstream should not be ready while its cross-branch prerequisite is open: {outcome:?}");

    let blocked_complete = facade
        .dispatch(
            "manage_task",
            "complete",
            json!({ "id": downstream, "completion_summary": "too early", "testing_notes": null, "force": false }),
        )
        .await;
    assert!(!blocked_complete.success, "completing downstream before its cross-branch prerequisite is done should be rejected");

    let completed_upstream = facade
        .dispatch(
            "manage_task",
            "complete",
            json!({ "id": upstream, "completion_summary": "done on branch A", "testing_notes": null, "force": false }),
        )
        .await;
    assert!(completed_upstream.success, "completing upstream should succeed: {:?}", completed_upstream.error);

    let outcome = data(&facade.dispatch("manage_task", "next", json!({ "branch_id": branch_b })).await).clone();
    let found = outcome.get("Found").expect("downstream should now be ready");
    assert_eq!(id_of(&found["task"]), downstream);
}

/// Scenario E: agent workload capacity is enforced, then frees up once a
/// task completes.
#[tokio::test]
async fn scenario_e_agent_capacity() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;

    let register = facade
        .dispatch(
            "manage_agent",
            "register",
            json!({
                "id": "agent-capacity", "project_id": project_id, "name": "Capacity Agent",
                "description": "seed test agent", "max_concurrent_tasks": 2
            }),
        )
        .await;
    assert!(register.success, "register should succeed: {:?}", register.error);

    let mut active = Vec::new();
    for title in ["Task 1", "Task 2"] {
        let id = id_of(data(
            &facade
                .dispatch(
                    "manage_task",
                    "create",
                    json!({
                        "branch_id": branch_id, "title": title, "description": "capacity test task",
                        "assignees": ["agent-capacity"]
                    }),
                )
                .await,
        ));
        active.push(id);
    }

    let third = facade
        .dispatch(
            "manage_task",
            "create",
            json!({
                "branch_id": branch_id, "title": "Task 3", "description": "should not fit",
                "assignees": ["agent-capacity"]
            }),
        )
        .await;
    assert!(!third.success, "a third assignment past max_concurrent_tasks should be rejected");
    assert_eq!(third.error.unwrap().kind, orchestrator_core::ErrorKind::Capacity);

    let completed = facade
        .dispatch(
            "manage_task",
            "complete",
            json!({ "id": active[0], "completion_summary": "done", "testing_notes": null, "force": false }),
        )
        .await;
    assert!(completed.success, "completing a task should free up agent capacity: {:?}", completed.error);

    let retry = facade
        .dispatch(
            "manage_task",
            "create",
            json!({
                "branch_id": branch_id, "title": "Task 3 retry", "description": "should fit now",
                "assignees": ["agent-capacity"]
            }),
        )
        .await;
    assert!(retry.success, "reassignment after freeing capacity should succeed: {:?}", retry.error);
}

/// Scenario F: subtask progress aggregates onto the parent task, and the
/// parent transitions to in_progress as soon as any subtask is active.
#[tokio::test]
async fn scenario_f_subtask_progress_aggregation() {
    let facade = facade().await;
    let project_id = create_project(&facade).await;
    let branch_id = create_branch(&facade, project_id).await;
    let task_id = id_of(data(
        &facade
            .dispatch(
                "manage_task",
                "create",
                json!({ "branch_id": branch_id, "title": "Parent", "description": "has subtasks" }),
            )
            .await,
    ));

    let s1 = id_of(&data(
        &facade
            .dispatch("manage_subtask", "create", json!({ "task_id": task_id, "title": "S1", "description": "first half" }))
            .await,
    )["subtask"]);
    let s2 = id_of(&data(
        &facade
            .dispatch("manage_subtask", "create", json!({ "task_id": task_id, "title": "S2", "description": "second half" }))
            .await,
    )["subtask"]);

    let s1_done = facade
        .dispatch("manage_subtask", "complete", json!({ "id": s1, "completion_summary": "all done" }))
        .await;
    assert!(s1_done.success, "completing S1 should succeed: {:?}", s1_done.error);

    let s2_progress = facade
        .dispatch(
            "manage_subtask",
            "update",
            json!({ "id": s2, "status": "inprogress", "progress_percentage": 50.0 }),
        )
        .await;
    assert!(s2_progress.success, "updating S2 should succeed: {:?}", s2_progress.error);

    let result = data(&s2_progress);
    let aggregated = result["task_progress"].as_f64().expect("task_progress should be a number");
    assert!((aggregated - 75.0).abs() < f64::EPSILON, "expected 75% aggregated progress, got {aggregated}");

    let parent = data(&facade.dispatch("manage_task", "get", json!({ "id": task_id })).await).clone();
    assert_eq!(parent["status"], json!("inprogress"), "parent should move to in_progress once any subtask is active");
}
