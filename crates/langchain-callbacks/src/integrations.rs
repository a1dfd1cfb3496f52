//! Third-party integration handlers.
//!
//! Each handler stages structured event records in memory, shaped the way the
//! vendor's ingestion API expects them; shipping the records is the exporter's
//! job, not the handler's. Handlers are grouped by concern:
//!
//! - [`experiment`]: experiment trackers (Aim, ClearML, Comet, MLflow, W&B,
//!   Flyte, SageMaker)
//! - [`monitoring`]: model monitoring and observability (Arize, Arthur,
//!   WhyLabs, Infino, LLMonitor, Context)
//! - [`annotation`]: data annotation and feedback (Argilla, Label Studio,
//!   Trubrics)
//! - [`prompt_layer`]: prompt registries (PromptLayer)

pub mod annotation;
pub mod experiment;
pub mod monitoring;
pub mod prompt_layer;

pub use annotation::{ArgillaCallbackHandler, LabelStudioCallbackHandler, TrubricsCallbackHandler};
pub use experiment::{
    AimCallbackHandler, ClearMLCallbackHandler, CometCallbackHandler, FlyteCallbackHandler,
    MlflowCallbackHandler, SageMakerCallbackHandler, WandbCallbackHandler,
};
pub use monitoring::{
    ArizeCallbackHandler, ArthurCallbackHandler, ContextCallbackHandler, InfinoCallbackHandler,
    LLMonitorCallbackHandler, WhyLabsCallbackHandler,
};
pub use prompt_layer::PromptLayerCallbackHandler;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A staged event awaiting export.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Event kind, e.g. `"llm_end"`.
    pub event: &'static str,
    /// Run that produced the event.
    pub run_id: Uuid,
    /// When the event was staged.
    pub time: DateTime<Utc>,
    /// Vendor-shaped payload.
    pub payload: Value,
}

/// Shared in-memory record buffer. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordSink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl RecordSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a record.
    pub fn record(&self, event: &'static str, run_id: Uuid, payload: Value) {
        self.records.lock().unwrap().push(EventRecord {
            event,
            run_id,
            time: Utc::now(),
            payload,
        });
    }

    /// Snapshot of the staged records.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Take the staged records, leaving the sink empty. An exporter calls
    /// this on flush.
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }

    /// Number of staged records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether no record is staged.
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

/// Step and event counters kept by the experiment-tracker handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetadataTracker {
    /// Total events observed.
    pub step: u64,
    pub llm_starts: u64,
    pub llm_ends: u64,
    pub llm_streams: u64,
    pub chain_starts: u64,
    pub chain_ends: u64,
    pub tool_starts: u64,
    pub tool_ends: u64,
    pub errors: u64,
    pub agent_actions: u64,
    pub agent_finishes: u64,
}

impl MetadataTracker {
    pub(crate) fn bump(&mut self, field: fn(&mut MetadataTracker) -> &mut u64) {
        self.step += 1;
        *field(self) += 1;
    }
}
