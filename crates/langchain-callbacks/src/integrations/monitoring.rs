//! Model monitoring and observability integrations.
//!
//! Most monitoring backends want prompt/response pairs, so several handlers
//! here remember the prompts from `on_llm_start` and join them with the
//! response at `on_llm_end`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::LlmResult;

use super::RecordSink;

/// Remembers prompts per run so end events can be joined with their inputs.
#[derive(Debug, Default)]
struct PromptCache {
    prompts: Mutex<HashMap<Uuid, Vec<String>>>,
}

impl PromptCache {
    fn store(&self, run_id: Uuid, prompts: &[String]) {
        self.prompts
            .lock()
            .unwrap()
            .insert(run_id, prompts.to_vec());
    }

    fn take(&self, run_id: Uuid) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .remove(&run_id)
            .unwrap_or_default()
    }
}

/// Callback handler staging prompt/response pairs for Arize.
#[derive(Debug, Default)]
pub struct ArizeCallbackHandler {
    /// Model id in Arize.
    pub model_id: Option<String>,
    /// Model version in Arize.
    pub model_version: Option<String>,
    cache: PromptCache,
    sink: RecordSink,
}

impl ArizeCallbackHandler {
    /// Create a handler for the given model.
    pub fn new(model_id: Option<String>, model_version: Option<String>) -> Self {
        Self {
            model_id,
            model_version,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for ArizeCallbackHandler {
    fn name(&self) -> &str {
        "ArizeCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.cache.store(run_id, prompts);
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let prompts = self.cache.take(run_id);
        for (i, generations) in result.generations.iter().enumerate() {
            for generation in generations {
                self.sink.record(
                    "prediction",
                    run_id,
                    json!({
                        "model_id": self.model_id,
                        "model_version": self.model_version,
                        "prompt": prompts.get(i),
                        "response": generation.text,
                    }),
                );
            }
        }
        Ok(())
    }
}

/// Callback handler staging inferences for Arthur.
#[derive(Debug)]
pub struct ArthurCallbackHandler {
    /// Arthur model id.
    pub model_id: String,
    cache: PromptCache,
    sink: RecordSink,
}

impl ArthurCallbackHandler {
    /// Create a handler for the given Arthur model.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            cache: PromptCache::default(),
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for ArthurCallbackHandler {
    fn name(&self) -> &str {
        "ArthurCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.cache.store(run_id, prompts);
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let prompts = self.cache.take(run_id);
        self.sink.record(
            "inference",
            run_id,
            json!({
                "model_id": self.model_id,
                "input": prompts,
                "output": result.first_text(),
                "token_usage": result.token_usage(),
            }),
        );
        Ok(())
    }
}

/// Callback handler staging text profiles for WhyLabs.
///
/// WhyLabs profiles aggregate statistics rather than raw text, so the staged
/// payload carries lengths alongside the text to be profiled.
#[derive(Debug, Default)]
pub struct WhyLabsCallbackHandler {
    /// WhyLabs organization id.
    pub org_id: Option<String>,
    /// Dataset the profiles are written to.
    pub dataset_id: Option<String>,
    sink: RecordSink,
}

impl WhyLabsCallbackHandler {
    /// Create a handler for the given org and dataset.
    pub fn new(org_id: Option<String>, dataset_id: Option<String>) -> Self {
        Self {
            org_id,
            dataset_id,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for WhyLabsCallbackHandler {
    fn name(&self) -> &str {
        "WhyLabsCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        for prompt in prompts {
            self.sink.record(
                "prompt",
                run_id,
                json!({"text": prompt, "length": prompt.len()}),
            );
        }
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        if let Some(text) = result.first_text() {
            self.sink.record(
                "response",
                run_id,
                json!({"text": text, "length": text.len()}),
            );
        }
        Ok(())
    }
}

/// Callback handler staging timestamped events for Infino.
///
/// Tracks per-call latency from start to end.
#[derive(Debug, Default)]
pub struct InfinoCallbackHandler {
    /// Model id attached to every record.
    pub model_id: Option<String>,
    starts: Mutex<HashMap<Uuid, Instant>>,
    sink: RecordSink,
}

impl InfinoCallbackHandler {
    /// Create a handler tagging records with the given model id.
    pub fn new(model_id: Option<String>) -> Self {
        Self {
            model_id,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for InfinoCallbackHandler {
    fn name(&self) -> &str {
        "InfinoCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.starts.lock().unwrap().insert(run_id, Instant::now());
        self.sink.record(
            "llm_start",
            run_id,
            json!({"model_id": self.model_id, "prompts": prompts}),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let latency_ms = self
            .starts
            .lock()
            .unwrap()
            .remove(&run_id)
            .map(|start| start.elapsed().as_millis() as u64);
        self.sink.record(
            "llm_end",
            run_id,
            json!({
                "model_id": self.model_id,
                "text": result.first_text(),
                "latency_ms": latency_ms,
                "token_usage": result.token_usage(),
            }),
        );
        Ok(())
    }

    fn on_llm_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.starts.lock().unwrap().remove(&run_id);
        self.sink.record("llm_error", run_id, json!({"error": error}));
        Ok(())
    }
}

/// Callback handler staging events for LLMonitor.
#[derive(Debug, Default)]
pub struct LLMonitorCallbackHandler {
    /// LLMonitor app id.
    pub app_id: Option<String>,
    sink: RecordSink,
}

impl LLMonitorCallbackHandler {
    /// Create a handler for the given app.
    pub fn new(app_id: Option<String>) -> Self {
        Self {
            app_id,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for LLMonitorCallbackHandler {
    fn name(&self) -> &str {
        "LLMonitorCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.sink.record(
            "llm_start",
            run_id,
            json!({
                "app_id": self.app_id,
                "parent_run_id": parent_run_id,
                "prompts": prompts,
            }),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.sink
            .record("llm_end", run_id, json!({"text": result.first_text()}));
        Ok(())
    }

    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
        run_id: Uuid,
    ) -> Result<()> {
        self.sink.record(
            "tool_start",
            run_id,
            json!({
                "name": crate::base::serialized_name(serialized),
                "input": input_str,
            }),
        );
        Ok(())
    }

    fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        self.sink.record("tool_end", run_id, json!({"output": output}));
        Ok(())
    }

    fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.sink
            .record("chain_error", run_id, json!({"error": error}));
        Ok(())
    }
}

/// Callback handler staging conversation transcripts for Context.
#[derive(Debug, Default)]
pub struct ContextCallbackHandler {
    transcript: Mutex<Vec<(String, String)>>,
    sink: RecordSink,
}

impl ContextCallbackHandler {
    /// Create a handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }

    /// The (role, text) transcript collected so far.
    pub fn transcript(&self) -> Vec<(String, String)> {
        self.transcript.lock().unwrap().clone()
    }
}

impl CallbackHandler for ContextCallbackHandler {
    fn name(&self) -> &str {
        "ContextCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let mut transcript = self.transcript.lock().unwrap();
        for prompt in prompts {
            transcript.push(("user".to_string(), prompt.clone()));
        }
        self.sink
            .record("thread_message", run_id, json!({"role": "user"}));
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        if let Some(text) = result.first_text() {
            self.transcript
                .lock()
                .unwrap()
                .push(("assistant".to_string(), text.to_string()));
            self.sink
                .record("thread_message", run_id, json!({"role": "assistant"}));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::Generation;

    fn simple_result(text: &str) -> LlmResult {
        LlmResult::new(vec![vec![Generation::new(text)]], None)
    }

    #[test]
    fn test_arize_pairs_prompts_with_responses() {
        let handler = ArizeCallbackHandler::new(Some("model-a".to_string()), None);
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["what is 2+2?".to_string()], run_id, None)
            .unwrap();
        handler.on_llm_end(&simple_result("4"), run_id).unwrap();

        let records = handler.records().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["prompt"], "what is 2+2?");
        assert_eq!(records[0].payload["response"], "4");
    }

    #[test]
    fn test_arthur_takes_prompts_once() {
        let handler = ArthurCallbackHandler::new("arthur-model");
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["q".to_string()], run_id, None)
            .unwrap();
        handler.on_llm_end(&simple_result("a"), run_id).unwrap();
        // Second end for the same run finds no cached prompts.
        handler.on_llm_end(&simple_result("a"), run_id).unwrap();

        let records = handler.records().records();
        assert_eq!(records[0].payload["input"], json!(["q"]));
        assert_eq!(records[1].payload["input"], json!([]));
    }

    #[test]
    fn test_whylabs_profiles_lengths() {
        let handler = WhyLabsCallbackHandler::new(None, Some("ds-1".to_string()));
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["hello".to_string()], run_id, None)
            .unwrap();
        handler.on_llm_end(&simple_result("hi"), run_id).unwrap();

        let records = handler.records().records();
        assert_eq!(records[0].payload["length"], 5);
        assert_eq!(records[1].payload["length"], 2);
    }

    #[test]
    fn test_infino_measures_latency() {
        let handler = InfinoCallbackHandler::new(Some("m".to_string()));
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &[], run_id, None)
            .unwrap();
        handler.on_llm_end(&simple_result("out"), run_id).unwrap();

        let records = handler.records().records();
        assert!(records[1].payload["latency_ms"].is_u64());
    }

    #[test]
    fn test_context_builds_transcript() {
        let handler = ContextCallbackHandler::new();
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["hello?".to_string()], run_id, None)
            .unwrap();
        handler
            .on_llm_end(&simple_result("hello!"), run_id)
            .unwrap();

        let transcript = handler.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0], ("user".to_string(), "hello?".to_string()));
        assert_eq!(
            transcript[1],
            ("assistant".to_string(), "hello!".to_string())
        );
    }
}
