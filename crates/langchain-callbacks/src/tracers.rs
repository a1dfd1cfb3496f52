//! Run tracing.
//!
//! [`LangChainTracer`] reconstructs a run tree from callback events and keeps
//! the finished runs in memory. The guard functions ([`tracing_v2_enabled`],
//! [`collect_runs`], [`wandb_tracing_enabled`]) install a tracer or flag in
//! thread-local context and restore the previous value on drop.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::base::{serialized_name, CallbackHandler};
use crate::error::Result;
use crate::outputs::LlmResult;

/// Kind of traced component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Llm,
    Chain,
    Tool,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunType::Llm => write!(f, "llm"),
            RunType::Chain => write!(f, "chain"),
            RunType::Tool => write!(f, "tool"),
        }
    }
}

/// A traced run: one LLM call, chain invocation, or tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub name: String,
    pub run_type: RunType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub inputs: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    /// Start a run now.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        run_type: RunType,
        inputs: HashMap<String, Value>,
        parent_run_id: Option<Uuid>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            run_type,
            parent_run_id,
            start_time: Utc::now(),
            end_time: None,
            inputs,
            outputs: None,
            error: None,
        }
    }

    /// Mark the run finished with outputs.
    pub fn set_end(&mut self, outputs: HashMap<String, Value>) {
        self.end_time = Some(Utc::now());
        self.outputs = Some(outputs);
    }

    /// Mark the run failed.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.end_time = Some(Utc::now());
        self.error = Some(error.into());
    }
}

#[derive(Debug, Default)]
struct TracerState {
    /// Runs that have started but not finished, keyed by run id.
    pending: HashMap<Uuid, Run>,
    /// Finished runs in completion order.
    runs: Vec<Run>,
}

/// Tracer that builds [`Run`] records from callback events.
#[derive(Debug, Clone)]
pub struct LangChainTracer {
    project_name: String,
    state: Arc<Mutex<TracerState>>,
}

impl Default for LangChainTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl LangChainTracer {
    /// Create a tracer; the project name comes from the environment.
    pub fn new() -> Self {
        Self::with_project_name(get_tracer_project())
    }

    /// Create a tracer with an explicit project name.
    pub fn with_project_name(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            state: Arc::new(Mutex::new(TracerState::default())),
        }
    }

    /// The project this tracer reports under.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Snapshot of the finished runs.
    pub fn runs(&self) -> Vec<Run> {
        self.state.lock().unwrap().runs.clone()
    }

    /// The most recently finished run.
    pub fn latest_run(&self) -> Option<Run> {
        self.state.lock().unwrap().runs.last().cloned()
    }

    /// Number of finished runs.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }

    /// Whether no run has finished yet.
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().runs.is_empty()
    }

    /// Drop all recorded runs.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        state.runs.clear();
    }

    fn start_run(&self, run: Run) {
        self.state.lock().unwrap().pending.insert(run.id, run);
    }

    fn end_run(&self, run_id: Uuid, outputs: Option<HashMap<String, Value>>, error: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let Some(mut run) = state.pending.remove(&run_id) else {
            tracing::debug!(%run_id, "end event for unknown run");
            return;
        };
        match error {
            Some(err) => run.set_error(err),
            None => run.set_end(outputs.unwrap_or_default()),
        }
        state.runs.push(run);
    }
}

impl CallbackHandler for LangChainTracer {
    fn name(&self) -> &str {
        "LangChainTracer"
    }

    fn on_llm_start(
        &self,
        serialized: &HashMap<String, Value>,
        prompts: &[String],
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let mut inputs = HashMap::new();
        inputs.insert("prompts".to_string(), serde_json::json!(prompts));
        self.start_run(Run::new(
            run_id,
            serialized_name(serialized),
            RunType::Llm,
            inputs,
            parent_run_id,
        ));
        Ok(())
    }

    fn on_llm_end(&self, result: &LlmResult, run_id: Uuid) -> Result<()> {
        let mut outputs = HashMap::new();
        if let Some(text) = result.first_text() {
            outputs.insert("text".to_string(), serde_json::json!(text));
        }
        if let Some(usage) = result.token_usage() {
            outputs.insert("token_usage".to_string(), serde_json::json!(usage));
        }
        self.end_run(run_id, Some(outputs), None);
        Ok(())
    }

    fn on_llm_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.end_run(run_id, None, Some(error));
        Ok(())
    }

    fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.start_run(Run::new(
            run_id,
            serialized_name(serialized),
            RunType::Chain,
            inputs.clone(),
            parent_run_id,
        ));
        Ok(())
    }

    fn on_chain_end(&self, outputs: &HashMap<String, Value>, run_id: Uuid) -> Result<()> {
        self.end_run(run_id, Some(outputs.clone()), None);
        Ok(())
    }

    fn on_chain_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.end_run(run_id, None, Some(error));
        Ok(())
    }

    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
        run_id: Uuid,
    ) -> Result<()> {
        let mut inputs = HashMap::new();
        inputs.insert("input".to_string(), serde_json::json!(input_str));
        self.start_run(Run::new(
            run_id,
            serialized_name(serialized),
            RunType::Tool,
            inputs,
            None,
        ));
        Ok(())
    }

    fn on_tool_end(&self, output: &str, run_id: Uuid) -> Result<()> {
        let mut outputs = HashMap::new();
        outputs.insert("output".to_string(), serde_json::json!(output));
        self.end_run(run_id, Some(outputs), None);
        Ok(())
    }

    fn on_tool_error(&self, error: &str, run_id: Uuid) -> Result<()> {
        self.end_run(run_id, None, Some(error));
        Ok(())
    }
}

/// Resolve the tracer project name from the environment, defaulting to
/// `"default"`.
pub fn get_tracer_project() -> String {
    for name in ["LANGCHAIN_PROJECT", "LANGCHAIN_SESSION"] {
        if let Ok(val) = std::env::var(name) {
            if !val.is_empty() {
                return val;
            }
        }
    }
    "default".to_string()
}

fn env_var_is_set(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok(v) if !v.is_empty() && v != "false" && v != "0")
}

thread_local! {
    static TRACING_V2_TRACER: RefCell<Option<Arc<LangChainTracer>>> = const { RefCell::new(None) };
    static RUN_COLLECTOR: RefCell<Option<Arc<LangChainTracer>>> = const { RefCell::new(None) };
    static WANDB_TRACING: Cell<bool> = const { Cell::new(false) };
}

/// Guard installed by [`tracing_v2_enabled`]; restores the previous tracer on
/// drop.
pub struct TracingV2Guard {
    tracer: Arc<LangChainTracer>,
    previous: Option<Arc<LangChainTracer>>,
}

impl TracingV2Guard {
    /// The tracer active for the guard's scope.
    pub fn tracer(&self) -> Arc<LangChainTracer> {
        self.tracer.clone()
    }
}

impl Drop for TracingV2Guard {
    fn drop(&mut self) {
        TRACING_V2_TRACER.with(|cell| {
            *cell.borrow_mut() = self.previous.take();
        });
    }
}

/// Enable v2 tracing for the current scope.
///
/// Installs a [`LangChainTracer`] in thread-local context; the previous tracer
/// is restored when the guard drops.
pub fn tracing_v2_enabled(project_name: Option<&str>) -> TracingV2Guard {
    let tracer = Arc::new(match project_name {
        Some(name) => LangChainTracer::with_project_name(name),
        None => LangChainTracer::new(),
    });
    let previous = TRACING_V2_TRACER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let prev = borrow.take();
        *borrow = Some(tracer.clone());
        prev
    });
    tracing::debug!(project = tracer.project_name(), "tracing v2 enabled");
    TracingV2Guard { tracer, previous }
}

/// Whether v2 tracing is active, via a guard or the environment.
pub fn tracing_v2_is_enabled() -> bool {
    TRACING_V2_TRACER.with(|cell| cell.borrow().is_some())
        || env_var_is_set("LANGCHAIN_TRACING_V2")
        || env_var_is_set("LANGSMITH_TRACING")
}

/// The tracer installed by [`tracing_v2_enabled`], if any.
pub fn get_tracing_tracer() -> Option<Arc<LangChainTracer>> {
    TRACING_V2_TRACER.with(|cell| cell.borrow().clone())
}

/// Guard installed by [`collect_runs`]; restores the previous collector on
/// drop.
pub struct RunCollectorGuard {
    collector: Arc<LangChainTracer>,
    previous: Option<Arc<LangChainTracer>>,
}

impl RunCollectorGuard {
    /// The collector active for the guard's scope.
    pub fn collector(&self) -> Arc<LangChainTracer> {
        self.collector.clone()
    }
}

impl Drop for RunCollectorGuard {
    fn drop(&mut self) {
        RUN_COLLECTOR.with(|cell| {
            *cell.borrow_mut() = self.previous.take();
        });
    }
}

/// Collect all runs in the current scope.
///
/// Register `guard.collector()` with a callback manager, run the pipeline,
/// then read runs off the collector.
pub fn collect_runs() -> RunCollectorGuard {
    let collector = Arc::new(LangChainTracer::new());
    let previous = RUN_COLLECTOR.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let prev = borrow.take();
        *borrow = Some(collector.clone());
        prev
    });
    RunCollectorGuard {
        collector,
        previous,
    }
}

/// The collector installed by [`collect_runs`], if any.
pub fn get_run_collector() -> Option<Arc<LangChainTracer>> {
    RUN_COLLECTOR.with(|cell| cell.borrow().clone())
}

/// Guard installed by [`wandb_tracing_enabled`]; restores the previous flag on
/// drop.
pub struct WandbTracingGuard {
    previous: bool,
}

impl Drop for WandbTracingGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        WANDB_TRACING.with(|cell| cell.set(previous));
    }
}

/// Enable Weights & Biases tracing for the current scope.
pub fn wandb_tracing_enabled() -> WandbTracingGuard {
    let previous = WANDB_TRACING.with(|cell| cell.replace(true));
    WandbTracingGuard { previous }
}

/// Whether W&B tracing is active, via a guard or the environment.
pub fn wandb_tracing_is_enabled() -> bool {
    WANDB_TRACING.with(|cell| cell.get()) || env_var_is_set("LANGCHAIN_WANDB_TRACING")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::Generation;
    use serde_json::json;

    #[test]
    fn test_tracer_builds_llm_run() {
        let tracer = LangChainTracer::with_project_name("test");
        let run_id = Uuid::new_v4();

        let mut serialized = HashMap::new();
        serialized.insert("name".to_string(), json!("fake-llm"));
        tracer
            .on_llm_start(&serialized, &["hello".to_string()], run_id, None)
            .unwrap();
        assert!(tracer.is_empty());

        let result = LlmResult::new(vec![vec![Generation::new("world")]], None);
        tracer.on_llm_end(&result, run_id).unwrap();

        let runs = tracer.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "fake-llm");
        assert_eq!(runs[0].run_type, RunType::Llm);
        assert!(runs[0].end_time.is_some());
        assert_eq!(runs[0].outputs.as_ref().unwrap()["text"], json!("world"));
    }

    #[test]
    fn test_tracer_records_errors() {
        let tracer = LangChainTracer::with_project_name("test");
        let run_id = Uuid::new_v4();

        tracer
            .on_chain_start(&HashMap::new(), &HashMap::new(), run_id, None)
            .unwrap();
        tracer.on_chain_error("broken link", run_id).unwrap();

        let runs = tracer.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].error.as_deref(), Some("broken link"));
    }

    #[test]
    fn test_tracer_nested_runs_keep_parent() {
        let tracer = LangChainTracer::with_project_name("test");
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();

        tracer
            .on_chain_start(&HashMap::new(), &HashMap::new(), parent_id, None)
            .unwrap();
        tracer
            .on_llm_start(&HashMap::new(), &[], child_id, Some(parent_id))
            .unwrap();
        tracer.on_llm_end(&LlmResult::default(), child_id).unwrap();
        tracer.on_chain_end(&HashMap::new(), parent_id).unwrap();

        let runs = tracer.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].parent_run_id, Some(parent_id));
        assert_eq!(runs[1].parent_run_id, None);
    }

    #[test]
    fn test_tracing_v2_guard_installs_and_restores() {
        assert!(get_tracing_tracer().is_none());
        {
            let guard = tracing_v2_enabled(Some("scoped"));
            assert!(tracing_v2_is_enabled());
            assert_eq!(guard.tracer().project_name(), "scoped");
            assert!(get_tracing_tracer().is_some());
        }
        assert!(get_tracing_tracer().is_none());
    }

    #[test]
    fn test_collect_runs_guard() {
        {
            let guard = collect_runs();
            let collector = guard.collector();

            let run_id = Uuid::new_v4();
            collector
                .on_tool_start(&HashMap::new(), "input", run_id)
                .unwrap();
            collector.on_tool_end("output", run_id).unwrap();

            assert_eq!(collector.len(), 1);
            assert!(get_run_collector().is_some());
        }
        assert!(get_run_collector().is_none());
    }

    #[test]
    fn test_nested_guards_restore_previous() {
        let outer = tracing_v2_enabled(Some("outer"));
        {
            let _inner = tracing_v2_enabled(Some("inner"));
            assert_eq!(get_tracing_tracer().unwrap().project_name(), "inner");
        }
        assert_eq!(get_tracing_tracer().unwrap().project_name(), "outer");
        drop(outer);
        assert!(get_tracing_tracer().is_none());
    }

    #[test]
    fn test_wandb_tracing_guard() {
        assert!(!WANDB_TRACING.with(|c| c.get()));
        {
            let _guard = wandb_tracing_enabled();
            assert!(wandb_tracing_is_enabled());
        }
        assert!(!WANDB_TRACING.with(|c| c.get()));
    }

    #[test]
    fn test_unknown_end_event_is_ignored() {
        let tracer = LangChainTracer::with_project_name("test");
        tracer.on_tool_end("orphan", Uuid::new_v4()).unwrap();
        assert!(tracer.is_empty());
    }
}
