//! Callback manager.
//!
//! Fans events out to every registered handler. An error from a handler with
//! `raise_error() == true` aborts dispatch and propagates; errors from other
//! handlers are logged and swallowed so one broken observer cannot take down
//! a run.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::base::{ArcCallbackHandler, CallbackHandler};
use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish, LlmResult};

/// Dispatches pipeline events to a set of handlers.
#[derive(Debug, Clone, Default)]
pub struct CallbackManager {
    /// Registered handlers, invoked in insertion order.
    pub handlers: Vec<ArcCallbackHandler>,
}

impl CallbackManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager from a list of handlers.
    pub fn from_handlers(handlers: Vec<ArcCallbackHandler>) -> Self {
        let mut manager = Self::new();
        for handler in handlers {
            manager.add_handler(handler);
        }
        manager
    }

    /// Register a handler. A handler already present (by pointer identity) is
    /// not added twice.
    pub fn add_handler(&mut self, handler: ArcCallbackHandler) {
        if !self
            .handlers
            .iter()
            .any(|h| Arc::ptr_eq(h, &handler))
        {
            self.handlers.push(handler);
        }
    }

    /// Remove a handler by pointer identity.
    pub fn remove_handler(&mut self, handler: &ArcCallbackHandler) {
        self.handlers.retain(|h| !Arc::ptr_eq(h, handler));
    }

    fn dispatch(
        &self,
        skip: impl Fn(&dyn CallbackHandler) -> bool,
        event: impl Fn(&dyn CallbackHandler) -> Result<()>,
    ) -> Result<()> {
        for handler in &self.handlers {
            if skip(handler.as_ref()) {
                continue;
            }
            if let Err(err) = event(handler.as_ref()) {
                if handler.raise_error() {
                    return Err(err);
                }
                tracing::warn!(handler = handler.name(), %err, "callback handler error");
            }
        }
        Ok(())
    }

    /// Notify handlers that an LLM call is starting. Returns the run id
    /// assigned to the call.
    pub fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        parent_run_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        self.dispatch(
            |h| h.ignore_llm(),
            |h| h.on_llm_start(serialized, prompts, run_id, parent_run_id),
        )?;
        Ok(run_id)
    }

    /// Notify handlers of a new streamed token.
    pub fn on_llm_new_token(&self, token: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|h| h.ignore_llm(), |h| h.on_llm_new_token(token, run_id))
    }

    /// Notify handlers that an LLM call finished.
    pub fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.dispatch(|h| h.ignore_llm(), |h| h.on_llm_end(result, run_id))
    }

    /// Notify handlers that an LLM call failed.
    pub fn on_llm_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|h| h.ignore_llm(), |h| h.on_llm_error(error, run_id))
    }

    /// Notify handlers that a chain is starting. Returns the run id assigned
    /// to the chain.
    pub fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
        parent_run_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        self.dispatch(
            |h| h.ignore_chain(),
            |h| h.on_chain_start(serialized, inputs, run_id, parent_run_id),
        )?;
        Ok(run_id)
    }

    /// Notify handlers that a chain finished.
    pub fn on_chain_end(&self, outputs: &HashMap<String, Value>, run_id: Uuid) -> Result<()> {
        self.dispatch(|h| h.ignore_chain(), |h| h.on_chain_end(outputs, run_id))
    }

    /// Notify handlers that a chain failed.
    pub fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|h| h.ignore_chain(), |h| h.on_chain_error(error, run_id))
    }

    /// Notify handlers that a tool is starting. Returns the run id assigned
    /// to the tool call.
    pub fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
    ) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        self.dispatch(
            |_| false,
            |h| h.on_tool_start(serialized, input_str, run_id),
        )?;
        Ok(run_id)
    }

    /// Notify handlers that a tool finished.
    pub fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|_| false, |h| h.on_tool_end(output, run_id))
    }

    /// Notify handlers that a tool failed.
    pub fn on_tool_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|_| false, |h| h.on_tool_error(error, run_id))
    }

    /// Notify handlers of free-form text.
    pub fn on_text(&self, text: &str, run_id: Uuid) -> Result<()> {
        self.dispatch(|_| false, |h| h.on_text(text, run_id))
    }

    /// Notify handlers of an agent action.
    pub fn on_agent_action(&self, action: &AgentAction, run_id: Uuid) -> Result<()> {
        self.dispatch(
            |h| h.ignore_agent(),
            |h| h.on_agent_action(action, run_id),
        )
    }

    /// Notify handlers of an agent's final answer.
    pub fn on_agent_finish(&self, finish: &AgentFinish, run_id: Uuid) -> Result<()> {
        self.dispatch(
            |h| h.ignore_agent(),
            |h| h.on_agent_finish(finish, run_id),
        )
    }
}
