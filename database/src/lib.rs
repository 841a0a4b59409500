//! SQLite persistence layer for the orchestrator.
//!
//! This crate provides `sqlx`-backed implementations of every repository
//! trait defined in `orchestrator-core`, connection pooling via
//! [`SqliteStore`], and embedded migrations.
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::new(":memory:").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

mod agents;
mod branches;
mod cache;
mod common;
mod context;
mod coordination;
mod delegations;
mod dependencies;
mod health;
mod insights;
mod pool;
mod projects;
mod subtasks;
mod tasks;

pub use agents::SqliteAgentRepository;
pub use branches::SqliteBranchRepository;
pub use cache::SqliteCacheRepository;
pub use context::{
    SqliteBranchContextRepository, SqliteGlobalContextRepository, SqliteProjectContextRepository,
    SqliteTaskContextRepository,
};
pub use coordination::{SqliteConflictRepository, SqliteHandoffRepository, SqliteMessageRepository};
pub use delegations::SqliteDelegationRepository;
pub use dependencies::SqliteDependencyRepository;
pub use health::SqliteHealthRepository;
pub use insights::SqliteInsightRepository;
pub use pool::SqliteStore;
pub use projects::SqliteProjectRepository;
pub use subtasks::SqliteSubtaskRepository;
pub use tasks::SqliteTaskRepository;

// Re-export core types for convenience so downstream crates can depend on
// `orchestrator-database` alone for the common case.
pub use orchestrator_core::{
    AgentRepository, BranchContextRepository, BranchRepository, CacheRepository, ConflictRepository,
    DelegationRepository, DependencyRepository, GlobalContextRepository, HandoffRepository, HealthRepository,
    InsightRepository, MessageRepository, OrchestratorError, ProjectContextRepository, ProjectRepository,
    RepositoryStats, Result, SubtaskRepository, TaskContextRepository, TaskRepository, Tier,
};
