//! Experiment-tracker integrations.
//!
//! These handlers stage run events for experiment tracking backends. They all
//! keep a [`MetadataTracker`] of step counters alongside the raw records,
//! which is what the tracking UIs plot.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::base::{serialized_name, CallbackHandler};
use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish, LlmResult};

use super::{MetadataTracker, RecordSink};

/// Callback handler staging events for an Aim run.
#[derive(Debug, Default)]
pub struct AimCallbackHandler {
    /// Aim repository path or URL.
    pub repo: Option<String>,
    /// Experiment the run belongs to.
    pub experiment_name: Option<String>,
    sink: RecordSink,
    tracker: Mutex<MetadataTracker>,
}

impl AimCallbackHandler {
    /// Create a handler for the given repo and experiment.
    pub fn new(repo: Option<String>, experiment_name: Option<String>) -> Self {
        Self {
            repo,
            experiment_name,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }

    /// Counter snapshot.
    pub fn tracker(&self) -> MetadataTracker {
        *self.tracker.lock().unwrap()
    }
}

impl CallbackHandler for AimCallbackHandler {
    fn name(&self) -> &str {
        "AimCallbackHandler"
    }

    fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_starts);
        self.sink.record(
            "llm_start",
            run_id,
            json!({"name": serialized_name(serialized), "prompts": prompts}),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_ends);
        self.sink
            .record("llm_end", run_id, json!({"text": result.first_text()}));
        Ok(())
    }

    fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.chain_starts);
        self.sink.record(
            "chain_start",
            run_id,
            json!({"name": serialized_name(serialized), "inputs": inputs}),
        );
        Ok(())
    }

    fn on_chain_end(&self, outputs: &HashMap<String, Value>, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.chain_ends);
        self.sink
            .record("chain_end", run_id, json!({"outputs": outputs}));
        Ok(())
    }

    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
        run_id: Uuid,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.tool_starts);
        self.sink.record(
            "tool_start",
            run_id,
            json!({"name": serialized_name(serialized), "input": input_str}),
        );
        Ok(())
    }

    fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.tool_ends);
        self.sink.record("tool_end", run_id, json!({"output": output}));
        Ok(())
    }
}

/// Callback handler staging events for a ClearML task.
#[derive(Debug)]
pub struct ClearMLCallbackHandler {
    /// ClearML project the task is filed under.
    pub project_name: String,
    /// Task display name.
    pub task_name: String,
    sink: RecordSink,
    tracker: Mutex<MetadataTracker>,
}

impl ClearMLCallbackHandler {
    /// Create a handler for the given project and task.
    pub fn new(project_name: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            task_name: task_name.into(),
            sink: RecordSink::new(),
            tracker: Mutex::new(MetadataTracker::default()),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }

    /// Counter snapshot.
    pub fn tracker(&self) -> MetadataTracker {
        *self.tracker.lock().unwrap()
    }
}

impl CallbackHandler for ClearMLCallbackHandler {
    fn name(&self) -> &str {
        "ClearMLCallbackHandler"
    }

    fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_starts);
        self.sink.record(
            "llm_start",
            run_id,
            json!({
                "project": self.project_name,
                "task": self.task_name,
                "name": serialized_name(serialized),
                "prompts": prompts,
            }),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_ends);
        self.sink.record(
            "llm_end",
            run_id,
            json!({"text": result.first_text(), "token_usage": result.token_usage()}),
        );
        Ok(())
    }

    fn on_llm_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.errors);
        self.sink.record("llm_error", run_id, json!({"error": error}));
        Ok(())
    }
}

/// Callback handler staging events for a Comet experiment.
#[derive(Debug, Default)]
pub struct CometCallbackHandler {
    /// Comet project name.
    pub project_name: Option<String>,
    /// Comet workspace.
    pub workspace: Option<String>,
    sink: RecordSink,
    tracker: Mutex<MetadataTracker>,
}

impl CometCallbackHandler {
    /// Create a handler for the given project and workspace.
    pub fn new(project_name: Option<String>, workspace: Option<String>) -> Self {
        Self {
            project_name,
            workspace,
            ..Self::default()
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }

    /// Counter snapshot.
    pub fn tracker(&self) -> MetadataTracker {
        *self.tracker.lock().unwrap()
    }
}

impl CallbackHandler for CometCallbackHandler {
    fn name(&self) -> &str {
        "CometCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_starts);
        self.sink
            .record("llm_start", run_id, json!({"prompts": prompts}));
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_ends);
        self.sink
            .record("llm_end", run_id, json!({"text": result.first_text()}));
        Ok(())
    }

    fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.errors);
        self.sink
            .record("chain_error", run_id, json!({"error": error}));
        Ok(())
    }

    fn on_agent_finish(&self, finish: &AgentFinish, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.agent_finishes);
        self.sink
            .record("agent_finish", run_id, json!({"log": finish.log}));
        Ok(())
    }
}

/// Callback handler staging events for an MLflow run.
#[derive(Debug)]
pub struct MlflowCallbackHandler {
    /// MLflow experiment name.
    pub experiment: String,
    /// Tracking server URI, if not the default.
    pub tracking_uri: Option<String>,
    sink: RecordSink,
}

impl MlflowCallbackHandler {
    /// Create a handler logging under the given experiment.
    pub fn new(experiment: impl Into<String>, tracking_uri: Option<String>) -> Self {
        Self {
            experiment: experiment.into(),
            tracking_uri,
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for MlflowCallbackHandler {
    fn name(&self) -> &str {
        "MlflowCallbackHandler"
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        // MLflow wants metrics, so token usage goes in as numbers.
        let usage = result.token_usage().unwrap_or_default();
        self.sink.record(
            "llm_end",
            run_id,
            json!({
                "experiment": self.experiment,
                "text": result.first_text(),
                "metrics": {
                    "prompt_tokens": usage.prompt_tokens,
                    "completion_tokens": usage.completion_tokens,
                    "total_tokens": usage.total_tokens,
                },
            }),
        );
        Ok(())
    }

    fn on_chain_end(&self, outputs: &HashMap<String, Value>, run_id: Uuid) -> Result<()> {
        self.sink
            .record("chain_end", run_id, json!({"outputs": outputs}));
        Ok(())
    }

    fn on_agent_action(&self, action: &AgentAction, run_id: Uuid) -> Result<()> {
        self.sink.record(
            "agent_action",
            run_id,
            json!({"tool": action.tool, "tool_input": action.tool_input}),
        );
        Ok(())
    }
}

/// Callback handler staging events for a Weights & Biases run.
#[derive(Debug, Default)]
pub struct WandbCallbackHandler {
    /// W&B project.
    pub project: Option<String>,
    /// W&B entity (user or team).
    pub entity: Option<String>,
    /// Job type tag for the run.
    pub job_type: Option<String>,
    sink: RecordSink,
    tracker: Mutex<MetadataTracker>,
}

impl WandbCallbackHandler {
    /// Create a handler for the given project and entity.
    pub fn new(project: Option<String>, entity: Option<String>) -> Self {
        Self {
            project,
            entity,
            ..Self::default()
        }
    }

    /// Set the job type tag.
    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }

    /// Counter snapshot.
    pub fn tracker(&self) -> MetadataTracker {
        *self.tracker.lock().unwrap()
    }
}

impl CallbackHandler for WandbCallbackHandler {
    fn name(&self) -> &str {
        "WandbCallbackHandler"
    }

    fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_starts);
        self.sink.record(
            "llm_start",
            run_id,
            json!({"name": serialized_name(serialized), "prompts": prompts}),
        );
        Ok(())
    }

    fn on_llm_new_token(&self, _token: &str, _run_id: Uuid) -> Result<()> {
        // Tokens are counted but not staged individually.
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_streams);
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.llm_ends);
        self.sink.record(
            "llm_end",
            run_id,
            json!({"text": result.first_text(), "token_usage": result.token_usage()}),
        );
        Ok(())
    }

    fn on_agent_action(&self, action: &AgentAction, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.agent_actions);
        self.sink
            .record("agent_action", run_id, json!({"tool": action.tool}));
        Ok(())
    }

    fn on_agent_finish(&self, finish: &AgentFinish, run_id: Uuid) -> Result<()> {
        self.tracker.lock().unwrap().bump(|t| &mut t.agent_finishes);
        self.sink
            .record("agent_finish", run_id, json!({"log": finish.log}));
        Ok(())
    }
}

/// Callback handler staging events for Flyte task decks.
#[derive(Debug, Default)]
pub struct FlyteCallbackHandler {
    sink: RecordSink,
}

impl FlyteCallbackHandler {
    /// Create a handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for FlyteCallbackHandler {
    fn name(&self) -> &str {
        "FlyteCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.sink
            .record("llm_start", run_id, json!({"prompts": prompts}));
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.sink
            .record("llm_end", run_id, json!({"text": result.first_text()}));
        Ok(())
    }

    fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        self.sink.record("tool_end", run_id, json!({"output": output}));
        Ok(())
    }
}

/// Callback handler staging events for a SageMaker Experiments run.
#[derive(Debug, Default)]
pub struct SageMakerCallbackHandler {
    /// Run name within the experiment.
    pub run_name: Option<String>,
    sink: RecordSink,
}

impl SageMakerCallbackHandler {
    /// Create a handler for the given run.
    pub fn new(run_name: Option<String>) -> Self {
        Self {
            run_name,
            sink: RecordSink::new(),
        }
    }

    /// Staged records.
    pub fn records(&self) -> &RecordSink {
        &self.sink
    }
}

impl CallbackHandler for SageMakerCallbackHandler {
    fn name(&self) -> &str {
        "SageMakerCallbackHandler"
    }

    fn on_llm_start(
        &self,
        _serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.sink.record(
            "llm_start",
            run_id,
            json!({"run_name": self.run_name, "prompts": prompts}),
        );
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        self.sink
            .record("llm_end", run_id, json!({"text": result.first_text()}));
        Ok(())
    }

    fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.sink
            .record("chain_error", run_id, json!({"error": error}));
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
    fn test_aim_counters_follow_events() {
        let handler = AimCallbackHandler::new(None, Some("exp-1".to_string()));
        let run_id = Uuid::new_v4();

        handler
            .on_llm_start(&HashMap::new(), &["p".to_string()], run_id, None)
            .unwrap();
        handler.on_llm_end(&simple_result("r"), run_id).unwrap();

        let tracker = handler.tracker();
        assert_eq!(tracker.step, 2);
        assert_eq!(tracker.llm_starts, 1);
        assert_eq!(tracker.llm_ends, 1);
        assert_eq!(handler.records().len(), 2);
    }

    #[test]
    fn test_clearml_records_errors() {
        let handler = ClearMLCallbackHandler::new("proj", "task");
        handler.on_llm_error("timeout", Uuid::new_v4()).unwrap();

        assert_eq!(handler.tracker().errors, 1);
        let records = handler.records().records();
        assert_eq!(records[0].event, "llm_error");
        assert_eq!(records[0].payload["error"], "timeout");
    }

    #[test]
    fn test_mlflow_stages_token_metrics() {
        let handler = MlflowCallbackHandler::new("exp", None);

        let mut llm_output = HashMap::new();
        llm_output.insert(
            "token_usage".to_string(),
            json!({"prompt_tokens": 4, "completion_tokens": 6, "total_tokens": 10}),
        );
        let result = LlmResult::new(vec![vec![Generation::new("out")]], Some(llm_output));
        handler.on_llm_end(&result, Uuid::new_v4()).unwrap();

        let records = handler.records().records();
        assert_eq!(records[0].payload["metrics"]["total_tokens"], 10);
    }

    #[test]
    fn test_wandb_counts_stream_tokens_without_staging() {
        let handler = WandbCallbackHandler::new(Some("proj".to_string()), None);
        let run_id = Uuid::new_v4();

        handler.on_llm_new_token("a", run_id).unwrap();
        handler.on_llm_new_token("b", run_id).unwrap();

        assert_eq!(handler.tracker().llm_streams, 2);
        assert!(handler.records().is_empty());
    }

    #[test]
    fn test_sagemaker_records_run_name() {
        let handler = SageMakerCallbackHandler::new(Some("run-7".to_string()));
        handler
            .on_llm_start(&HashMap::new(), &[], Uuid::new_v4(), None)
            .unwrap();

        let records = handler.records().records();
        assert_eq!(records[0].payload["run_name"], "run-7");
    }
}
