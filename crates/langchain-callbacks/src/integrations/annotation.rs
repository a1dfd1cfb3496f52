//! Data annotation and feedback integrations.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::LlmResult;

use super::RecordSink;

/// Callback handler staging records for an Argilla dataset.
///
/// Each finished LLM call becomes one dataset record per prompt/response pair.
#[derive(Debug)]
pub struct ArgillaCallbackHandler {
    /// Target dataset name.
    pub dataset_name: String,
    /// Workspace the dataset lives in.
    pub workspace_name: Option<String>,
    prompts: Mutex<HashMap<Uuid, Vec<String>>>,
    sink: RecordSink,
}

impl ArgillaCallbackHandler {
    /// Create a handler writing to the given dataset.
    pub fn new(dataset_name: impl Into<String>, workspace_name: Option<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            workspace_name,
            prompts: Mutex::new(HashMap::new()),
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for ArgillaCallbackHandler {
    fn name(&self) -> &str {
        "ArgillaCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.prompts
            .lock()
            .unwrap()
            .insert(run_id, prompts.to_vec());
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let prompts = self
            .prompts
            .lock()
            .unwrap()
            .remove(&run_id)
            .unwrap_or_default();
        for (i, generations) in result.generations.iter().enumerate() {
            for generation in generations {
                self.sink.record(
                    "dataset_record",
                    run_id,
                    json!({
                        "dataset": self.dataset_name,
                        "workspace": self.workspace_name,
                        "prompt": prompts.get(i),
                        "response": generation.text,
                    }),
                );
            }
        }
        Ok(())
    }
}

/// Callback handler staging tasks for a Label Studio project.
#[derive(Debug)]
pub struct LabelStudioCallbackHandler {
    /// Target project name.
    pub project_name: String,
    sink: RecordSink,
}

impl LabelStudioCallbackHandler {
    /// Create a handler writing tasks to the given project.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for LabelStudioCallbackHandler {
    fn name(&self) -> &str {
        "LabelStudioCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.sink.record(
            "task",
            run_id,
            json!({"project": self.project_name, "prompts": prompts}),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let texts: Vec<&str> = result
            .generations
            .iter()
            .flatten()
            .map(|g| g.text.as_str())
            .collect();
        self.sink.record(
            "annotation",
            run_id,
            json!({"project": self.project_name, "responses": texts}),
        );
        Ok(())
    }
}

/// Callback handler staging prompt/completion pairs for Trubrics.
#[derive(Debug)]
pub struct TrubricsCallbackHandler {
    /// Trubrics project.
    pub project: String,
    prompts: Mutex<HashMap<Uuid, Vec<String>>>,
    sink: RecordSink,
}

impl TrubricsCallbackHandler {
    /// Create a handler for the given project.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            prompts: Mutex::new(HashMap::new()),
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for TrubricsCallbackHandler {
    fn name(&self) -> &str {
        "TrubricsCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.prompts
            .lock()
            .unwrap()
            .insert(run_id, prompts.to_vec());
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let prompts = self
            .prompts
            .lock()
            .unwrap()
            .remove(&run_id)
            .unwrap_or_default();
        self.sink.record(
            "prompt_event",
            run_id,
            json!({
                "project": self.project,
                "prompt": prompts.first(),
                "completion": result.first_text(),
                "model": result.model_name(),
            }),
        );
        Ok(())
    }
}
