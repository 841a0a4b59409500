//! Integration tests for configuration loading and application bootstrap,
//! driven through the public `orchestrator_server` surface rather than the
//! `#[cfg(test)]` modules inside `config.rs`/`setup.rs` themselves.

use orchestrator_server::{ensure_database_directory, ensure_database_directory_from_config, initialize_app, Config};
use std::env;
use tempfile::TempDir;

#[tokio::test]
async fn server_starts_up_against_a_fresh_sqlite_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let mut config = Config::default();
    config.database.url = Some(database_url);

    let facade = initialize_app(&config).await;
    assert!(facade.is_ok(), "failed to initialize app: {:?}", facade.err());
    assert!(db_path.exists(), "migrations should have created the database file");
}

#[test]
fn default_configuration_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.listen_addr, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
}

#[test]
fn standard_environment_variables_override_defaults() {
    // Environment variables are process-global; run this test's mutations and
    // assertions together rather than relying on test isolation.
    env::set_var("DATABASE_URL", "sqlite://test_env.db");
    env::set_var("LISTEN_ADDR", "0.0.0.0");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::default().merge_with_env().unwrap();
    assert_eq!(config.database.url, Some("sqlite://test_env.db".to_string()));
    assert_eq!(config.server.listen_addr, "0.0.0.0");
    assert_eq!(config.logging.level, "debug");

    env::remove_var("DATABASE_URL");
    env::remove_var("LISTEN_ADDR");
    env::remove_var("LOG_LEVEL");
}

#[test]
fn default_database_path_falls_back_to_home_directory() {
    let config = Config::default();
    let url = config.database_url();
    assert!(url.starts_with("sqlite://"));
    assert!(url.contains(".sqlite"));
}

#[test]
fn ensure_database_directory_creates_missing_parents() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("subdir").join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let result = ensure_database_directory(&database_url);
    assert!(result.is_ok());
    assert!(db_path.parent().unwrap().exists());
}

#[test]
fn ensure_database_directory_from_config_reads_the_configured_url() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("test.db");
    let mut config = Config::default();
    config.database.url = Some(format!("sqlite://{}", db_path.display()));

    assert!(ensure_database_directory_from_config(&config).is_ok());
    assert!(db_path.parent().unwrap().exists());
}

#[test]
fn configuration_validation_catches_every_invalid_field() {
    let mut config = Config::default();

    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());
    config.logging.level = "info".to_string();

    config.database.url = Some("postgres://invalid".to_string());
    assert!(config.validate().is_err());
    config.database.url = None;

    config.server.port = 0;
    assert!(config.validate().is_err());
    config.server.port = 3000;

    config.server.workers = 0;
    assert!(config.validate().is_err());
    config.server.workers = 4;

    config.database.max_connections = 0;
    assert!(config.validate().is_err());
    config.database.max_connections = 5;

    config.context.cache_ttl_seconds = 0;
    assert!(config.validate().is_err());
    config.context.cache_ttl_seconds = 600;

    config.scheduler.next_task_timeout_ms = 0;
    assert!(config.validate().is_err());
    config.scheduler.next_task_timeout_ms = 5_000;

    assert!(config.validate().is_ok());
}

#[test]
fn server_address_combines_listen_addr_and_port() {
    let mut config = Config::default();
    config.server.listen_addr = "0.0.0.0".to_string();
    config.server.port = 8080;
    assert_eq!(config.server_address(), "0.0.0.0:8080");
}

#[tokio::test]
async fn repeated_initialization_against_the_same_database_file_both_succeed() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("shared.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let mut config = Config::default();
    config.database.url = Some(database_url);

    let first = initialize_app(&config).await;
    assert!(first.is_ok(), "first initialization failed: {:?}", first.err());

    let second = initialize_app(&config).await;
    assert!(second.is_ok(), "second initialization against an already-migrated database failed: {:?}", second.err());
}
