//! Streaming console handlers.
//!
//! [`StreamingStdOutCallbackHandler`] echoes every token as it arrives.
//! [`FinalStreamingStdOutCallbackHandler`] stays silent until the agent's
//! final-answer prefix has streamed past, then echoes only the answer itself.

use std::io::Write;
use std::sync::Mutex;

use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::stdout::{stdout_writer, SharedWriter};

/// Callback handler that streams tokens to stdout. Only useful with LLMs that
/// support streaming.
#[derive(Clone)]
pub struct StreamingStdOutCallbackHandler {
    writer: SharedWriter,
}

impl std::fmt::Debug for StreamingStdOutCallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingStdOutCallbackHandler").finish()
    }
}

impl Default for StreamingStdOutCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingStdOutCallbackHandler {
    /// Create a handler writing to stdout.
    pub fn new() -> Self {
        Self {
            writer: stdout_writer(),
        }
    }

    /// Create a handler with a custom writer.
    pub fn with_writer(writer: SharedWriter) -> Self {
        Self { writer }
    }
}

impl CallbackHandler for StreamingStdOutCallbackHandler {
    fn name(&self) -> &str {
        "StreamingStdOutCallbackHandler"
    }

    fn on_llm_new_token(&self, token: &str, _run_id: Uuid) -> Result<()> {
        if let Ok(mut w) = self.writer.lock() {
            let _ = write!(w, "{}", token);
            let _ = w.flush();
        }
        Ok(())
    }
}

/// Default token sequence that marks the start of an agent's final answer.
pub const DEFAULT_ANSWER_PREFIX_TOKENS: &[&str] = &["Final", "Answer", ":"];

#[derive(Debug)]
struct FinalStreamState {
    /// Sliding window of the most recent tokens, same length as the prefix.
    last_tokens: Vec<String>,
    answer_reached: bool,
}

/// Callback handler that streams only the agent's final answer to stdout.
///
/// Tokens are buffered in a sliding window until the window matches the
/// answer prefix; everything after the prefix is echoed.
pub struct FinalStreamingStdOutCallbackHandler {
    answer_prefix_tokens: Vec<String>,
    /// Compare tokens with whitespace stripped.
    strip_tokens: bool,
    state: Mutex<FinalStreamState>,
    writer: SharedWriter,
}

impl std::fmt::Debug for FinalStreamingStdOutCallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalStreamingStdOutCallbackHandler")
            .field("answer_prefix_tokens", &self.answer_prefix_tokens)
            .field("strip_tokens", &self.strip_tokens)
            .finish()
    }
}

impl Default for FinalStreamingStdOutCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FinalStreamingStdOutCallbackHandler {
    /// Create a handler with the default answer prefix.
    pub fn new() -> Self {
        Self::with_prefix_tokens(
            DEFAULT_ANSWER_PREFIX_TOKENS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Create a handler with a custom answer prefix token sequence.
    ///
    /// An empty prefix means there is nothing to wait for: every token is
    /// echoed.
    pub fn with_prefix_tokens(answer_prefix_tokens: Vec<String>) -> Self {
        let window = answer_prefix_tokens.len();
        Self {
            state: Mutex::new(FinalStreamState {
                last_tokens: vec![String::new(); window],
                answer_reached: answer_prefix_tokens.is_empty(),
            }),
            answer_prefix_tokens,
            strip_tokens: true,
            writer: stdout_writer(),
        }
    }

    /// Swap the output writer.
    pub fn with_writer(mut self, writer: SharedWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Disable token stripping when matching the prefix.
    pub fn exact_match(mut self) -> Self {
        self.strip_tokens = false;
        self
    }

    fn normalize(&self, token: &str) -> String {
        if self.strip_tokens {
            token
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        } else {
            token.to_string()
        }
    }

    fn prefix_matched(&self, last_tokens: &[String]) -> bool {
        last_tokens
            .iter()
            .zip(&self.answer_prefix_tokens)
            .all(|(seen, want)| seen == &self.normalize(want))
    }
}

impl CallbackHandler for FinalStreamingStdOutCallbackHandler {
    fn name(&self) -> &str {
        "FinalStreamingStdOutCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &std::collections::HashMap<String, serde_json::Value>,
        _prompts: &[String],
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.answer_reached = self.answer_prefix_tokens.is_empty();
        for slot in &mut state.last_tokens {
            slot.clear();
        }
        Ok(())
    }

    fn on_llm_new_token(&self, token: &str, _run_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if state.answer_reached {
            if let Ok(mut w) = self.writer.lock() {
                let _ = write!(w, "{}", token);
                let _ = w.flush();
            }
            return Ok(());
        }

        let normalized = self.normalize(token);
        state.last_tokens.remove(0);
        state.last_tokens.push(normalized);

        if self.prefix_matched(&state.last_tokens) {
            state.answer_reached = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdout::test_support::capture_writer;

    #[test]
    fn test_streaming_handler_echoes_tokens() {
        let (writer, buffer) = capture_writer();
        let handler = StreamingStdOutCallbackHandler::with_writer(writer);

        let run_id = Uuid::new_v4();
        handler.on_llm_new_token("Hello", run_id).unwrap();
        handler.on_llm_new_token(", world", run_id).unwrap();

        assert_eq!(buffer.contents(), "Hello, world");
    }

    #[test]
    fn test_final_streaming_suppresses_until_prefix() {
        let (writer, buffer) = capture_writer();
        let handler = FinalStreamingStdOutCallbackHandler::new().with_writer(writer);

        let run_id = Uuid::new_v4();
        for token in ["I", "should", "think", "Final", "Answer", ":", " 42"] {
            handler.on_llm_new_token(token, run_id).unwrap();
        }

        // Only tokens after the prefix are echoed.
        assert_eq!(buffer.contents(), " 42");
    }

    #[test]
    fn test_final_streaming_resets_on_new_llm_start() {
        let (writer, buffer) = capture_writer();
        let handler = FinalStreamingStdOutCallbackHandler::new().with_writer(writer);

        let run_id = Uuid::new_v4();
        for token in ["Final", "Answer", ":", "first"] {
            handler.on_llm_new_token(token, run_id).unwrap();
        }
        handler
            .on_llm_start(&std::collections::HashMap::new(), &[], run_id, None)
            .unwrap();
        handler.on_llm_new_token("hidden", run_id).unwrap();

        assert_eq!(buffer.contents(), "first");
    }

    #[test]
    fn test_empty_prefix_echoes_everything() {
        let (writer, buffer) = capture_writer();
        let handler =
            FinalStreamingStdOutCallbackHandler::with_prefix_tokens(vec![]).with_writer(writer);

        let run_id = Uuid::new_v4();
        handler.on_llm_new_token("a", run_id).unwrap();
        handler
            .on_llm_start(&std::collections::HashMap::new(), &[], run_id, None)
            .unwrap();
        handler.on_llm_new_token("b", run_id).unwrap();

        assert_eq!(buffer.contents(), "ab");
    }

    #[test]
    fn test_prefix_matching_strips_whitespace() {
        let (writer, buffer) = capture_writer();
        let handler = FinalStreamingStdOutCallbackHandler::new().with_writer(writer);

        let run_id = Uuid::new_v4();
        for token in ["Final ", " Answer", " :", "yes"] {
            handler.on_llm_new_token(token, run_id).unwrap();
        }

        assert_eq!(buffer.contents(), "yes");
    }
}
