//! Production `AgentInvoker`: spawns a configured command per case, feeding
//! the case as JSON on stdin and parsing the agent's JSON reply from stdout.
//! The HTTP gateway / pricing / provider routing this command might wrap are
//! independent collaborators, out of scope here (spec.md §1).

use async_trait::async_trait;
use evalgate_core::invoker::{AgentInvoker, InvokerError, InvokerOutcome};
use evalgate_core::model::Case;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Spawns `shell -c <command>` per invocation; `command` runs through the
/// platform shell so operators can pass pipelines or shell-quoted args.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    command: String,
}

impl ProcessInvoker {
    /// Creates an invoker that shells out to `command` for every case.
    #[must_use]
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

#[derive(Serialize)]
struct RequestPayload<'a> {
    case_id: &'a str,
    input_prompt: &'a str,
}

#[derive(Deserialize)]
struct ResponsePayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    json: Option<serde_json::Value>,
    #[serde(default)]
    tokens_total: u64,
    #[serde(default)]
    cost: f64,
}

#[async_trait]
impl AgentInvoker for ProcessInvoker {
    async fn invoke(&self, case: &Case) -> Result<InvokerOutcome, InvokerError> {
        let payload = RequestPayload {
            case_id: &case.case_id,
            input_prompt: &case.input_prompt,
        };
        let request = serde_json::to_vec(&payload)
            .map_err(|err| InvokerError(format!("failed to encode request: {err}")))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|err| InvokerError(format!("failed to spawn agent command: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|err| InvokerError(format!("failed to write request: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| InvokerError(format!("failed to wait on agent command: {err}")))?;

        if !output.status.success() {
            return Err(InvokerError(format!(
                "agent command exited with status {}",
                output.status
            )));
        }

        let parsed: ResponsePayload = serde_json::from_slice(&output.stdout)
            .map_err(|err| InvokerError(format!("failed to parse agent response: {err}")))?;

        Ok(InvokerOutcome {
            text: parsed.text,
            json: parsed.json,
            tokens_total: parsed.tokens_total,
            cost: parsed.cost,
        })
    }
}
