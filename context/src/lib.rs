//! Context Engine (C2)
//!
//! Implements the four-tier inheritance model — `global > project > branch >
//! task` — behind four operations: resolve, update, delegate, invalidate.
//!
//! - [`tiers`] — the merge rule (deep-merge, lower tier wins, override maps).
//! - [`resolver`] — the pure walk-and-merge algorithm over fetched snapshots.
//! - [`cache`] — freshness checks and entry construction for the resolved-
//!   context cache.
//! - [`locks`] — per-tier async locks shared by the resolve recompute path
//!   and the delegation worker's ordering guarantee.
//! - [`delegation`] — the background worker that auto-merges or defers
//!   queued delegations.
//! - [`engine`] — [`engine::ContextEngine`], the entry point every other
//!   crate talks to.

pub mod cache;
pub mod delegation;
pub mod engine;
pub mod locks;
pub mod resolver;
pub mod tiers;

pub use engine::ContextEngine;
pub use tiers::Tier;
