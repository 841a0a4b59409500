//! Task and branch state machines (§4.4).

use crate::models::{BranchStatus, TaskStatus};

/// Valid task transitions, per the diagram in §4.4:
///
/// ```text
/// todo -> in_progress -> review -> testing -> done
///   \        |              |         |
///    -> blocked <-----------+---------+
///   \        |
///    -> cancelled / archived
/// ```
///
/// `done` and `cancelled` are terminal except for the explicit `reopen`
/// action, modeled separately as [`can_reopen`] rather than as a regular
/// transition since it is gated by a grace-period config value the state
/// machine itself does not know about.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    if from == to {
        return false;
    }
    match (from, to) {
        (Todo, InProgress | Blocked | Cancelled | Archived) => true,
        (InProgress, Review | Blocked | Done | Cancelled | Archived) => true,
        (Review, InProgress | Testing | Blocked | Done | Cancelled | Archived) => true,
        (Testing, InProgress | Blocked | Done | Cancelled | Archived) => true,
        (Blocked, Todo | InProgress | Review | Testing | Cancelled | Archived) => true,
        (Done, Archived) => true,
        _ => false,
    }
}

/// Reopen is only a valid move from `Done` (clears `completion_summary`),
/// and only within the configured grace window — the caller supplies
/// whether that window has elapsed.
pub fn can_reopen(from: TaskStatus, within_grace_window: bool) -> bool {
    from == TaskStatus::Done && within_grace_window
}

/// Derives a branch's status purely from its task counts and whether any
/// task is currently blocked / in progress (§4.4 branch aggregation).
pub fn derive_branch_status(
    task_count: i64,
    completed_task_count: i64,
    any_blocked: bool,
    any_in_progress: bool,
    previous: BranchStatus,
) -> BranchStatus {
    if task_count == 0 {
        return BranchStatus::Todo;
    }
    if completed_task_count == task_count {
        return BranchStatus::Done;
    }
    if any_blocked && !any_in_progress {
        return BranchStatus::Blocked;
    }
    if previous == BranchStatus::Todo {
        return BranchStatus::Active;
    }
    previous
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(can_transition(Todo, InProgress));
        assert!(can_transition(InProgress, Review));
        assert!(can_transition(Review, Testing));
        assert!(can_transition(Testing, Done));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(!can_transition(Done, InProgress));
        assert!(!can_transition(Cancelled, Todo));
        assert!(!can_transition(Archived, Todo));
    }

    #[test]
    fn blocked_can_return_to_any_active_state() {
        assert!(can_transition(Blocked, InProgress));
        assert!(can_transition(Blocked, Todo));
    }

    #[test]
    fn reopen_requires_grace_window() {
        assert!(can_reopen(Done, true));
        assert!(!can_reopen(Done, false));
        assert!(!can_reopen(Cancelled, true));
    }

    #[test]
    fn branch_status_done_when_all_tasks_complete() {
        let status = derive_branch_status(3, 3, false, false, BranchStatus::Active);
        assert_eq!(status, BranchStatus::Done);
    }

    #[test]
    fn branch_status_blocked_when_blocked_and_nothing_active() {
        let status = derive_branch_status(2, 0, true, false, BranchStatus::Active);
        assert_eq!(status, BranchStatus::Blocked);
    }

    #[test]
    fn branch_status_empty_is_todo() {
        let status = derive_branch_status(0, 0, false, false, BranchStatus::Active);
        assert_eq!(status, BranchStatus::Todo);
    }
}
