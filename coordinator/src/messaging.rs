//! Agent-to-agent messaging (§4.5 `SendMessage`).

use chrono::Utc;
use std::collections::BTreeSet;

use orchestrator_core::{AgentCommunication, Priority};

pub fn new_message(
    from_agent: String,
    to_agents: BTreeSet<String>,
    task_id: Option<i64>,
    message_type: String,
    content: String,
    priority: Priority,
) -> AgentCommunication {
    AgentCommunication {
        id: 0,
        from_agent,
        to_agents,
        task_id,
        message_type,
        content,
        priority,
        created_at: Utc::now(),
        read_by: BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_unread() {
        let msg = new_message("a".into(), BTreeSet::new(), None, "note".into(), "hi".into(), Priority::Low);
        assert!(msg.read_by.is_empty());
    }
}
