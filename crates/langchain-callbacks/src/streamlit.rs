//! Streamlit-style thought log.
//!
//! Models the agent run as a sequence of "thoughts": one per LLM call, updated
//! as tools run, completed when the agent finishes. The UI layer is out of
//! scope here; the handler keeps the thought log in memory so a frontend can
//! render it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish, LlmResult};

/// Lifecycle of a single thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThoughtState {
    /// The LLM is thinking about what to do next.
    Thinking,
    /// The LLM decided on a tool and the tool is running.
    RunningTool,
    /// The thought finished, either with a tool result or a final answer.
    Complete,
}

/// One agent thought: an LLM call and the tool work it led to.
#[derive(Debug, Clone)]
pub struct Thought {
    /// Display label, produced by [`LLMThoughtLabeler`].
    pub label: String,
    /// Tool chosen by this thought, if any.
    pub tool: Option<String>,
    /// Accumulated LLM tokens for this thought.
    pub text: String,
    /// Current lifecycle state.
    pub state: ThoughtState,
}

/// Generates display labels for thoughts.
///
/// Override the trait-free methods by wrapping; the defaults mirror the
/// conventional labels.
#[derive(Debug, Clone, Default)]
pub struct LLMThoughtLabeler;

impl LLMThoughtLabeler {
    /// Create a labeler.
    pub fn new() -> Self {
        Self
    }

    /// Label for a thought that has not selected a tool yet.
    pub fn get_initial_label(&self) -> String {
        "Thinking...".to_string()
    }

    /// Label for a thought that is running (or ran) a tool.
    pub fn get_tool_label(&self, tool: &str, is_complete: bool) -> String {
        if is_complete {
            format!("Used **{}**", tool)
        } else {
            format!("Running **{}**...", tool)
        }
    }

    /// Label for the closing thought that carries the final answer.
    pub fn get_final_agent_thought_label(&self) -> String {
        "Complete!".to_string()
    }
}

#[derive(Debug, Default)]
struct ThoughtLog {
    thoughts: Vec<Thought>,
}

impl ThoughtLog {
    fn current_mut(&mut self) -> Option<&mut Thought> {
        self.thoughts.last_mut()
    }
}

/// Callback handler that records agent thoughts for a Streamlit-style UI.
#[derive(Debug, Clone)]
pub struct StreamlitCallbackHandler {
    labeler: LLMThoughtLabeler,
    log: Arc<Mutex<ThoughtLog>>,
}

impl Default for StreamlitCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamlitCallbackHandler {
    /// Create a handler with the default labeler.
    pub fn new() -> Self {
        Self::with_labeler(LLMThoughtLabeler::new())
    }

    /// Create a handler with a custom labeler.
    pub fn with_labeler(labeler: LLMThoughtLabeler) -> Self {
        Self {
            labeler,
            log: Arc::new(Mutex::new(ThoughtLog::default())),
        }
    }

    /// Snapshot of the recorded thoughts.
    pub fn thoughts(&self) -> Vec<Thought> {
        self.log.lock().unwrap().thoughts.clone()
    }
}

impl CallbackHandler for StreamlitCallbackHandler {
    fn name(&self) -> &str {
        "StreamlitCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        _prompts: &[String],
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.thoughts.push(Thought {
            label: self.labeler.get_initial_label(),
            tool: None,
            text: String::new(),
            state: ThoughtState::Thinking,
        });
        Ok(())
    }

    fn on_llm_new_token(&self, token: &str, _run_id: Uuid) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if let Some(thought) = log.current_mut() {
            thought.text.push_str(token);
        }
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, _run_id: Uuid) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if let Some(thought) = log.current_mut() {
            if thought.text.is_empty() {
                if let Some(text) = result.first_text() {
                    thought.text = text.to_string();
                }
            }
        }
        Ok(())
    }

    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        _input_str: &str,
        _run_id: Uuid,
    ) -> Result<()> {
        let tool = crate::base::serialized_name(serialized).to_string();
        let mut log = self.log.lock().unwrap();
        if let Some(thought) = log.current_mut() {
            thought.label = self.labeler.get_tool_label(&tool, false);
            thought.tool = Some(tool);
            thought.state = ThoughtState::RunningTool;
        }
        Ok(())
    }

    fn on_tool_end(&self, _output: &str, _run_id: Uuid) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if let Some(thought) = log.current_mut() {
            if let Some(tool) = thought.tool.clone() {
                thought.label = self.labeler.get_tool_label(&tool, true);
            }
            thought.state = ThoughtState::Complete;
        }
        Ok(())
    }

    fn on_agent_action(&self, action: &AgentAction, _run_id: Uuid) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if let Some(thought) = log.current_mut() {
            if thought.text.is_empty() {
                thought.text = action.log.clone();
            }
        }
        Ok(())
    }

    fn on_agent_finish(&self, finish: &AgentFinish, _run_id: Uuid) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        let label = self.labeler.get_final_agent_thought_label();
        log.thoughts.push(Thought {
            label,
            tool: None,
            text: finish.log.clone(),
            state: ThoughtState::Complete,
        });
        Ok(())
    }
}
