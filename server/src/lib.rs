//! Tool Dispatch Facade (C6): configuration, database wiring, and the
//! stdio transport for the orchestration server.

pub mod config;
pub mod dispatch;
pub mod setup;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use dispatch::{Envelope, Facade};
pub use setup::{ensure_database_directory, ensure_database_directory_from_config, initialize_app};
pub use stdio::StdioServer;
pub use telemetry::init_telemetry;
