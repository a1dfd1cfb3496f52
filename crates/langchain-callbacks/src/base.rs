//! Base callback handler trait.
//!
//! Every handler in this crate implements [`CallbackHandler`]. All event
//! methods default to no-ops so a handler only overrides the events it cares
//! about. Methods return a `Result` so gating handlers (human approval) can
//! veto an event; how an error is treated depends on
//! [`CallbackHandler::raise_error`] and is decided by the
//! [`CallbackManager`](crate::manager::CallbackManager).

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish, LlmResult};

/// Shared, thread-safe handle to a callback handler.
pub type ArcCallbackHandler = Arc<dyn CallbackHandler>;

/// Observer for pipeline events.
///
/// Handlers receive the run id of the emitting component; start events also
/// carry the parent run id so tracers can reconstruct the run tree.
#[allow(unused_variables)]
pub trait CallbackHandler: Send + Sync + Debug {
    /// Human-readable handler name, used in diagnostics.
    fn name(&self) -> &str;

    /// Whether an error from this handler aborts the run instead of being
    /// logged and swallowed.
    fn raise_error(&self) -> bool {
        false
    }

    /// Whether LLM events should be skipped for this handler.
    fn ignore_llm(&self) -> bool {
        false
    }

    /// Whether chain events should be skipped for this handler.
    fn ignore_chain(&self) -> bool {
        false
    }

    /// Whether agent events should be skipped for this handler.
    fn ignore_agent(&self) -> bool {
        false
    }

    /// An LLM call is starting.
    fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// A streaming LLM produced a new token.
    fn on_llm_new_token(&self, token: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// An LLM call finished.
    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// An LLM call failed.
    fn on_llm_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// A chain is starting.
    fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// A chain finished.
    fn on_chain_end(&self, outputs: &HashMap<String, Value>, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// A chain failed.
    fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// A tool is starting.
    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
        run_id: Uuid,
    ) -> Result<()> {
        Ok(())
    }

    /// A tool finished.
    fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// A tool failed.
    fn on_tool_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// Free-form text emitted mid-run.
    fn on_text(&self, text: &str, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// An agent decided to invoke a tool.
    fn on_agent_action(&self, action: &AgentAction, run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// An agent produced its final answer.
    fn on_agent_finish(&self, finish: &AgentFinish, run_id: Uuid) -> Result<()> {
        Ok(())
    }
}

/// Pull a display name out of a component's serialized form.
///
/// Prefers the `name` key, falling back to the last segment of the `id` path.
pub(crate) fn serialized_name(serialized: &HashMap<String, Value>) -> &str {
    serialized
        .get("name")
        .and_then(|v| v.as_str())
        .or_else(|| {
            serialized.get("id").and_then(|v| {
                v.as_array()
                    .and_then(|arr| arr.last())
                    .and_then(|v| v.as_str())
            })
        })
        .unwrap_or("<unknown>")
}
