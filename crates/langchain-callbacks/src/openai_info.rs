//! Callback handler that tracks OpenAI token usage and spend.
//!
//! The handler aggregates usage reported in `LlmResult::llm_output` across
//! calls. Clones share state, so the same handler can be registered with
//! several managers and read afterwards.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::{LlmResult, TokenUsage};

/// Cost in USD per 1k tokens, split by prompt/completion.
///
/// A deliberately small table; unknown models are tracked with zero cost
/// rather than rejected.
const MODEL_COST_PER_1K_TOKENS: &[(&str, f64, f64)] = &[
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4", 0.03, 0.06),
    ("gpt-3.5-turbo", 0.0005, 0.0015),
];

/// Per-1k-token prompt and completion cost for a model name, if known.
pub fn openai_model_cost(model_name: &str) -> Option<(f64, f64)> {
    MODEL_COST_PER_1K_TOKENS
        .iter()
        .find(|(name, _, _)| *name == model_name)
        .map(|(_, prompt, completion)| (*prompt, *completion))
}

#[derive(Debug, Default, Clone)]
struct OpenAIStats {
    usage: TokenUsage,
    successful_requests: u64,
    total_cost: f64,
}

/// Callback handler that tracks OpenAI usage info.
#[derive(Debug, Clone, Default)]
pub struct OpenAICallbackHandler {
    stats: Arc<Mutex<OpenAIStats>>,
}

impl OpenAICallbackHandler {
    /// Create a fresh handler with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total tokens across all tracked calls.
    pub fn total_tokens(&self) -> u64 {
        self.stats.lock().unwrap().usage.total_tokens
    }

    /// Prompt tokens across all tracked calls.
    pub fn prompt_tokens(&self) -> u64 {
        self.stats.lock().unwrap().usage.prompt_tokens
    }

    /// Completion tokens across all tracked calls.
    pub fn completion_tokens(&self) -> u64 {
        self.stats.lock().unwrap().usage.completion_tokens
    }

    /// Number of successful calls observed.
    pub fn successful_requests(&self) -> u64 {
        self.stats.lock().unwrap().successful_requests
    }

    /// Estimated spend in USD across all tracked calls.
    pub fn total_cost(&self) -> f64 {
        self.stats.lock().unwrap().total_cost
    }
}

impl fmt::Display for OpenAICallbackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats.lock().unwrap();
        writeln!(f, "Tokens Used: {}", stats.usage.total_tokens)?;
        writeln!(f, "\tPrompt Tokens: {}", stats.usage.prompt_tokens)?;
        writeln!(f, "\tCompletion Tokens: {}", stats.usage.completion_tokens)?;
        writeln!(f, "Successful Requests: {}", stats.successful_requests)?;
        write!(f, "Total Cost (USD): ${:.6}", stats.total_cost)
    }
}

impl CallbackHandler for OpenAICallbackHandler {
    fn name(&self) -> &str {
        "OpenAICallbackHandler"
    }

    fn on_llm_end(&self, result: &LlmResult, _run_id: Uuid) -> Result<()> {
        let usage = result.token_usage();
        let cost = match (usage, result.model_name()) {
            (Some(usage), Some(model)) => openai_model_cost(model)
                .map(|(prompt_rate, completion_rate)| {
                    usage.prompt_tokens as f64 / 1000.0 * prompt_rate
                        + usage.completion_tokens as f64 / 1000.0 * completion_rate
                })
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let mut stats = self.stats.lock().unwrap();
        stats.successful_requests += 1;
        if let Some(usage) = usage {
            stats.usage = stats.usage.add(&usage);
        }
        stats.total_cost += cost;
        Ok(())
    }
}

/// Guard returned by [`get_openai_callback`], dereferencing to the handler.
pub struct OpenAICallbackGuard {
    handler: OpenAICallbackHandler,
}

impl OpenAICallbackGuard {
    /// The underlying handler.
    pub fn handler(&self) -> &OpenAICallbackHandler {
        &self.handler
    }

    /// An Arc-wrapped handler suitable for a callback manager.
    pub fn as_arc_handler(&self) -> Arc<dyn CallbackHandler> {
        Arc::new(self.handler.clone())
    }
}

impl Deref for OpenAICallbackGuard {
    type Target = OpenAICallbackHandler;

    fn deref(&self) -> &Self::Target {
        &self.handler
    }
}

/// Get a scoped OpenAI usage tracker.
///
/// Register `guard.as_arc_handler()` with a callback manager, run the calls,
/// then read totals off the guard.
pub fn get_openai_callback() -> OpenAICallbackGuard {
    OpenAICallbackGuard {
        handler: OpenAICallbackHandler::new(),
    }
}
