//! Step planner backed by the Claude CLI.

use std::process::{Output, Stdio};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{build_prompt, parse_response, PlannerError, PlannerRequest, PlannerResponse, StepPlanner};

/// Planner that shells out to `claude --print`.
pub struct ClaudeCliPlanner {
    claude_path: String,
    model: Option<String>,
}

impl ClaudeCliPlanner {
    /// Create a planner using `claude` from `PATH`
    pub fn new() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None,
        }
    }

    /// Set custom Claude CLI path
    pub fn with_claude_path(mut self, path: String) -> Self {
        self.claude_path = path;
        self
    }

    /// Set Claude model to use (e.g., "sonnet", "opus")
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Spawn the CLI, feed the prompt on stdin and collect its output.
    async fn run_cli(&self, prompt: &str) -> anyhow::Result<Output> {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("--print").arg("--output-format").arg("json");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .context("Failed to spawn Claude CLI. Is 'claude' installed?")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write prompt to Claude")?;
            stdin.shutdown().await.context("Failed to close stdin")?;
        }

        child
            .wait_with_output()
            .await
            .context("Failed to wait for Claude CLI")
    }
}

impl Default for ClaudeCliPlanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Model text from the CLI's JSON envelope (`result`, or `text` on older
/// versions). Output that is not an envelope is taken as the text itself.
pub(crate) fn envelope_text(stdout: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(stdout) {
        Ok(envelope) => ["result", "text"]
            .iter()
            .find_map(|k| envelope.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| stdout.to_string()),
        Err(_) => stdout.to_string(),
    }
}

#[async_trait]
impl StepPlanner for ClaudeCliPlanner {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerResponse, PlannerError> {
        let prompt = build_prompt(request);
        log::debug!("planning {} elements for {}", request.elements.len(), request.url);

        let output = self
            .run_cli(&prompt)
            .await
            .map_err(|e| PlannerError::Transport(format!("{:#}", e)))?;

        if !output.status.success() {
            return Err(PlannerError::Status {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_response(&envelope_text(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_text() {
        let stdout = r#"{"type":"result","result":"{\"steps\": []}"}"#;
        assert_eq!(envelope_text(stdout), "{\"steps\": []}");
        assert_eq!(envelope_text(r#"{"text":"hi"}"#), "hi");
        assert_eq!(envelope_text("plain words"), "plain words");
    }

    #[tokio::test]
    async fn test_missing_binary_is_transport_error() {
        let planner = ClaudeCliPlanner::new().with_claude_path("/nonexistent/claude-cli".into());
        let request = PlannerRequest {
            task: "t".into(),
            url: "https://a.test/".into(),
            title: String::new(),
            elements: vec![],
            page_context: None,
            completed_steps: vec![],
        };
        let err = planner.plan(&request).await.unwrap_err();
        assert!(matches!(err, PlannerError::Transport(_)));
        assert!(err.is_retryable());
    }
}
