use crate::core::error::ChatError;
use crate::providers::Transport;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Seconds the execution service may spend on one snippet.
pub const EXECUTION_TIMEOUT_SECS: f64 = 30.0;

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    timeout: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed_s: Option<f64>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == 0
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(error) = &self.error {
            parts.push(format!("error: {}", error));
        }
        if !self.stdout.is_empty() {
            parts.push(self.stdout.clone());
        }
        if !self.stderr.is_empty() {
            parts.push(format!("stderr:\n{}", self.stderr));
        }
        let timing = self
            .elapsed_s
            .map(|s| format!(" in {:.2}s", s))
            .unwrap_or_default();
        parts.push(format!("[exit {}{}]", self.exit_code, timing));
        parts.join("\n")
    }
}

/// Hands a snippet to the external execution service and waits for its result.
pub async fn run_code(
    transport: &dyn Transport,
    endpoint: &str,
    code: &str,
) -> Result<ExecutionResult, ChatError> {
    if code.trim().is_empty() {
        return Err(ChatError::Input("No code provided".to_string()));
    }

    let payload = serde_json::to_value(ExecuteRequest {
        code,
        timeout: EXECUTION_TIMEOUT_SECS,
    })?;
    info!(endpoint, bytes = code.len(), "dispatching code to executor");
    let response = transport.post_json(endpoint, &[], &payload).await?;

    if !response.is_success() {
        let failure = ChatError::http(response.status, &response.body);
        return Err(ChatError::Execution(failure.to_string()));
    }
    Ok(serde_json::from_str(&response.body)?)
}
