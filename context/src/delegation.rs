//! Background processing for `Delegate` (§4.2.4): a worker drains queued
//! delegation ids and either auto-merges them into the target tier or
//! leaves them for manual approval.

use std::sync::Arc;

use orchestrator_core::{ContextPatch, DelegationStatus, Tier, TriggerType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::ContextEngine;
use crate::locks::KeyedLocks;

/// Returns true when a delegation's trigger type is eligible for automatic
/// merging and the target's rules allow it. Rules are an object with an
/// `"auto_merge"` boolean; absence means manual-only.
fn auto_merge_allowed(trigger_type: TriggerType, rules: &serde_json::Value) -> bool {
    let eligible_trigger = matches!(trigger_type, TriggerType::AutoThreshold | TriggerType::AutoPattern);
    let rules_permit = rules.get("auto_merge").and_then(|v| v.as_bool()).unwrap_or(false);
    eligible_trigger && rules_permit
}

/// Spawns the delegation worker, returning the sender end that
/// [`ContextEngine::delegate`] enqueues newly created delegation ids into,
/// and the worker's join handle.
pub fn spawn(engine: Arc<ContextEngine>, queue_capacity: usize) -> (mpsc::Sender<i64>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let handle = tokio::spawn(run(engine, rx));
    (tx, handle)
}

/// Spawns the worker against a receiver obtained elsewhere — used when the
/// sender half must be wired into the engine via
/// [`ContextEngine::with_delegation_queue`] before the engine itself is
/// wrapped in the `Arc` the worker loop borrows.
pub fn spawn_with_queue(engine: Arc<ContextEngine>, rx: mpsc::Receiver<i64>) -> JoinHandle<()> {
    tokio::spawn(run(engine, rx))
}

async fn run(engine: Arc<ContextEngine>, mut rx: mpsc::Receiver<i64>) {
    // Serializes merges per (target_level, target_id) so that delegations
    // queued in order for the same tier are applied in that order, even if
    // several distinct targets are being processed concurrently.
    let target_locks: KeyedLocks<Tier> = KeyedLocks::new();
    while let Some(delegation_id) = rx.recv().await {
        let lock = {
            let delegation = match engine.delegations().get(delegation_id).await {
                Ok(Some(d)) => d,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(delegation_id, error = %err, "failed to load queued delegation");
                    continue;
                }
            };
            target_locks.get(delegation.target_level)
        };
        let _guard = lock.lock().await;
        if let Err(err) = process_one(&engine, delegation_id).await {
            tracing::warn!(delegation_id, error = %err, "delegation processing failed");
        }
    }
}

async fn process_one(engine: &ContextEngine, delegation_id: i64) -> orchestrator_core::Result<()> {
    let delegation = match engine.delegations().get(delegation_id).await? {
        Some(d) => d,
        None => return Ok(()),
    };
    if delegation.processed {
        return Ok(());
    }

    let rules = engine.delegation_rules_for(delegation.target_level).await?;
    if !auto_merge_allowed(delegation.trigger_type, &rules) {
        // Left pending for a human to approve via the facade.
        return Ok(());
    }

    let patch = ContextPatch { data: Some(delegation.delegated_data.clone()), overrides: None, inheritance_disabled: None, force_local_only: None };
    match engine.update(delegation.target_level, patch, None, true).await {
        Ok(()) => {
            engine
                .delegations()
                .mark_processed(delegation_id, Some(true), None, DelegationStatus::Implemented, Some("delegation-worker".to_string()))
                .await?;
        }
        Err(err) => {
            engine
                .delegations()
                .mark_processed(
                    delegation_id,
                    Some(false),
                    Some(err.to_string()),
                    DelegationStatus::Rejected,
                    Some("delegation-worker".to_string()),
                )
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_threshold_requires_rules_permission() {
        assert!(!auto_merge_allowed(TriggerType::AutoThreshold, &json!({})));
        assert!(auto_merge_allowed(TriggerType::AutoThreshold, &json!({"auto_merge": true})));
    }

    #[test]
    fn manual_trigger_never_auto_merges() {
        assert!(!auto_merge_allowed(TriggerType::Manual, &json!({"auto_merge": true})));
    }

    #[test]
    fn ai_initiated_trigger_never_auto_merges() {
        assert!(!auto_merge_allowed(TriggerType::AiInitiated, &json!({"auto_merge": true})));
    }
}
