//! Test utilities for the orchestrator crates
//!
//! This crate provides shared testing infrastructure including:
//! - Mock implementations of the repository traits (C1)
//! - Realistic test data fixtures and builders
//! - Random/property-based data generators
//! - Custom assertion helpers
//! - Contract test suites any repository implementation should pass

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod repository;

pub use assertions::*;
pub use builders::*;
pub use contracts::*;
pub use fixtures::*;
pub use generators::*;
pub use repository::{MockAgentRepository, MockProjectRepository, MockTaskRepository};
