//! The injected capability the runner executes cases against. Mirrors the
//! teacher's `Arc<dyn LlmClient>` seam: the runner never inspects which
//! concrete invoker it holds.

use crate::model::Case;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Raw outcome of invoking the agent against one case, before classification.
#[derive(Debug, Clone)]
pub struct InvokerOutcome {
    /// Raw text output.
    pub text: String,
    /// Parsed JSON output, if the invoker produced any.
    pub json: Option<serde_json::Value>,
    /// Total tokens consumed.
    pub tokens_total: u64,
    /// Cost of the invocation, invoker-defined unit.
    pub cost: f64,
}

/// An error the invoker raised that isn't a deadline (classified as
/// `provider_error` by the runner).
#[derive(Debug, thiserror::Error)]
#[error("agent invocation failed: {0}")]
pub struct InvokerError(pub String);

/// Maps a case input to a case output. Mock and production invokers are two
/// implementations of this same capability; the runner never inspects which.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Runs `case.input_prompt` through the agent and returns its raw output.
    async fn invoke(&self, case: &Case) -> Result<InvokerOutcome, InvokerError>;
}

/// One scripted response for `FakeInvoker`, consumed in call order.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Respond successfully with this outcome.
    Ok(InvokerOutcome),
    /// Fail with a non-deadline provider error.
    Err(String),
    /// Never resolve before the runner's deadline elapses.
    HangForever,
}

/// Deterministic test invoker: returns scripted outcomes keyed by `case_id`,
/// consumed in declaration order across repeated calls; defaults to echoing
/// `case_id` as the output text once its script is exhausted or unset.
#[derive(Debug, Default)]
pub struct FakeInvoker {
    scripted: HashMap<String, Vec<FakeOutcome>>,
    call_counts: Mutex<HashMap<String, usize>>,
}

impl FakeInvoker {
    /// Creates an invoker with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `outcome` as the next response for `case_id`.
    #[must_use]
    pub fn with_outcome(mut self, case_id: impl Into<String>, outcome: FakeOutcome) -> Self {
        self.scripted.entry(case_id.into()).or_default().push(outcome);
        self
    }

    fn next_outcome(&self, case_id: &str) -> Option<&FakeOutcome> {
        let queue = self.scripted.get(case_id)?;
        let mut counts = self.call_counts.lock().unwrap();
        let idx = counts.entry(case_id.to_string()).or_insert(0);
        let outcome = queue.get(*idx).or_else(|| queue.last());
        *idx += 1;
        outcome
    }
}

#[async_trait]
impl AgentInvoker for FakeInvoker {
    async fn invoke(&self, case: &Case) -> Result<InvokerOutcome, InvokerError> {
        match self.next_outcome(&case.case_id) {
            Some(FakeOutcome::Ok(outcome)) => Ok(outcome.clone()),
            Some(FakeOutcome::Err(msg)) => Err(InvokerError(msg.clone())),
            Some(FakeOutcome::HangForever) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(InvokerOutcome {
                text: case.case_id.clone(),
                json: None,
                tokens_total: 0,
                cost: 0.0,
            }),
        }
    }
}
