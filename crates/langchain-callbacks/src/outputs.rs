//! Event payload types passed to callback handlers.
//!
//! These are the slices of a pipeline run that handlers observe: completed
//! LLM results, token usage, and agent decisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token counts for a single model call, or an aggregate over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens billed for the call.
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record; the total is derived.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Combine two usage records, saturating on overflow.
    pub fn add(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self
                .completion_tokens
                .saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// A single generated completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text.
    pub text: String,
    /// Provider-specific info such as finish reason or logprobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<HashMap<String, Value>>,
}

impl Generation {
    /// Create a generation from text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            info: None,
        }
    }
}

/// The result of an LLM call, handed to `on_llm_end`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResult {
    /// One entry per prompt; candidate generations for that prompt.
    pub generations: Vec<Vec<Generation>>,
    /// Provider output that is not tied to a single generation, conventionally
    /// carrying `token_usage` and `model_name` keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<HashMap<String, Value>>,
}

impl LlmResult {
    /// Build a result from a flat list of generations and optional output map.
    pub fn new(
        generations: Vec<Vec<Generation>>,
        llm_output: Option<HashMap<String, Value>>,
    ) -> Self {
        Self {
            generations,
            llm_output,
        }
    }

    /// Token usage reported by the provider, if any.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.llm_output
            .as_ref()
            .and_then(|out| out.get("token_usage"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Model name reported by the provider, if any.
    pub fn model_name(&self) -> Option<&str> {
        self.llm_output
            .as_ref()
            .and_then(|out| out.get("model_name"))
            .and_then(|v| v.as_str())
    }

    /// Text of the first generation, if there is one.
    pub fn first_text(&self) -> Option<&str> {
        self.generations
            .first()
            .and_then(|g| g.first())
            .map(|g| g.text.as_str())
    }
}

/// An agent's decision to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    /// Name of the tool to invoke.
    pub tool: String,
    /// Input passed to the tool.
    pub tool_input: Value,
    /// The raw reasoning text that produced this action.
    pub log: String,
}

/// An agent's terminal answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinish {
    /// Final outputs keyed by name.
    pub return_values: HashMap<String, Value>,
    /// The raw reasoning text that produced the answer.
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_usage_add() {
        let a = TokenUsage::new(10, 20);
        let b = TokenUsage::new(5, 15);
        let sum = a.add(&b);
        assert_eq!(sum.prompt_tokens, 15);
        assert_eq!(sum.completion_tokens, 35);
        assert_eq!(sum.total_tokens, 50);
    }

    #[test]
    fn test_llm_result_token_usage_from_output() {
        let mut llm_output = HashMap::new();
        llm_output.insert(
            "token_usage".to_string(),
            json!({"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}),
        );
        llm_output.insert("model_name".to_string(), json!("gpt-4o-mini"));

        let result = LlmResult::new(vec![vec![Generation::new("hi")]], Some(llm_output));

        let usage = result.token_usage().unwrap();
        assert_eq!(usage.total_tokens, 10);
        assert_eq!(result.model_name(), Some("gpt-4o-mini"));
        assert_eq!(result.first_text(), Some("hi"));
    }

    #[test]
    fn test_llm_result_without_output() {
        let result = LlmResult::default();
        assert!(result.token_usage().is_none());
        assert!(result.model_name().is_none());
        assert!(result.first_text().is_none());
    }
}
