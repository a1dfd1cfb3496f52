//! Prompt registry integrations.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::LlmResult;

use super::RecordSink;

/// Callback handler staging request records for PromptLayer.
///
/// PromptLayer wants the full request: prompts, response, model, tags, and
/// the request window, so the handler holds the start data until the call
/// ends.
#[derive(Debug, Default)]
pub struct PromptLayerCallbackHandler {
    /// Tags attached to every tracked request.
    pub pl_tags: Vec<String>,
    in_flight: Mutex<HashMap<Uuid, (Vec<String>, DateTime<Utc>)>>,
    sink: RecordSink,
}

impl PromptLayerCallbackHandler {
    /// Create a handler with the given tags.
    pub fn new(pl_tags: Vec<String>) -> Self {
        Self {
            pl_tags,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for PromptLayerCallbackHandler {
    fn name(&self) -> &str {
        "PromptLayerCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.in_flight
            .lock()
            .unwrap()
            .insert(run_id, (prompts.to_vec(), Utc::now()));
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let Some((prompts, request_start)) = self.in_flight.lock().unwrap().remove(&run_id)
        else {
            return Ok(());
        };
        self.sink.record(
            "request",
            run_id,
            json!({
                "tags": self.pl_tags,
                "prompts": prompts,
                "response": result.first_text(),
                "model": result.model_name(),
                "request_start": request_start,
                "request_end": Utc::now(),
            }),
        );
        Ok(())
    }

    fn on_llm_error(&self, _error: &str, run_id: Uuid) -> Result<()> {
        // Failed requests are not registered.
        self.in_flight.lock().unwrap().remove(&run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::Generation;

    #[test]
    fn test_request_staged_with_tags() {
        let handler = PromptLayerCallbackHandler::new(vec!["prod".to_string()]);
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["hi".to_string()], run_id, None)
            .unwrap();
        let result = LlmResult::new(vec![vec![Generation::new("hello")]], None);
        handler.on_llm_end(&result, run_id).unwrap();

        let records = handler.records().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "request");
        assert_eq!(records[0].payload["tags"], json!(["prod"]));
        assert_eq!(records[0].payload["response"], "hello");
    }

    #[test]
    fn test_failed_request_not_staged() {
        let handler = PromptLayerCallbackHandler::new(vec![]);
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["hi".to_string()], run_id, None)
            .unwrap();
        handler.on_llm_error("boom", run_id).unwrap();

        assert!(handler.records().is_empty());
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let handler = PromptLayerCallbackHandler::new(vec![]);
        handler
            .on_llm_end(&LlmResult::default(), Uuid::new_v4())
            .unwrap();
        assert!(handler.records().is_empty());
    }
}
