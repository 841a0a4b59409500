//! Conflict recording (§4.5 `RecordConflict`/`ResolveConflict`). The
//! repository owns storage; this module just builds the initial record.

use chrono::Utc;
use std::collections::BTreeSet;

use orchestrator_core::ConflictRecord;

pub fn new_conflict(task_id: Option<i64>, conflict_type: String, agents: BTreeSet<String>, details: String) -> ConflictRecord {
    ConflictRecord {
        id: 0,
        task_id,
        conflict_type,
        agents,
        details,
        is_resolved: false,
        resolution_strategy: None,
        resolution_details: None,
        created_at: Utc::now(),
        resolved_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conflict_starts_unresolved() {
        let conflict = new_conflict(Some(1), "merge".into(), BTreeSet::new(), "d".into());
        assert!(!conflict.is_resolved);
        assert!(conflict.resolved_at.is_none());
    }
}
