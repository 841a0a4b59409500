//! STDIO transport for the Tool Dispatch Facade.
//!
//! Each incoming line is a JSON object `{ tool, arguments }`, where
//! `arguments` carries an `action` field alongside the action's own
//! parameters (see §6). The facade is the only thing that understands
//! `action`; this transport just frames the wire surface and writes back
//! the envelope as a single line of JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::dispatch::{Envelope, Facade};

pub struct StdioServer {
    facade: Arc<Facade>,
}

impl StdioServer {
    pub fn new(facade: Arc<Facade>) -> Self {
        Self { facade }
    }

    /// Runs the read-eval-print loop over stdin/stdout until EOF.
    pub async fn serve(self) -> Result<()> {
        info!("starting orchestrator-server in stdio mode");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!("received: {}", trimmed);
                    let envelope = self.process_line(trimmed).await;
                    let response = serde_json::to_string(&envelope).context("failed to serialize envelope")?;
                    stdout.write_all(response.as_bytes()).await.context("failed to write response")?;
                    stdout.write_all(b"\n").await.context("failed to write newline")?;
                    stdout.flush().await.context("failed to flush stdout")?;
                }
                Err(e) => {
                    error!("error reading from stdin: {}", e);
                    break;
                }
            }
        }

        info!("stdio transport shutdown complete");
        Ok(())
    }

    async fn process_line(&self, line: &str) -> Envelope {
        let message: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Self::malformed(format!("invalid JSON: {e}")),
        };

        let tool = match message.get("tool").and_then(|v| v.as_str()) {
            Some(t) => t.to_string(),
            None => return Self::malformed("missing 'tool' field".to_string()),
        };

        let arguments = message.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));

        let action = match arguments.get("action").and_then(|v| v.as_str()) {
            Some(a) => a.to_string(),
            None => return Self::malformed("missing 'arguments.action' field".to_string()),
        };

        self.facade.dispatch(&tool, &action, arguments).await
    }

    fn malformed(message: String) -> Envelope {
        warn!("malformed request: {}", message);
        Envelope::malformed(message)
    }
}
