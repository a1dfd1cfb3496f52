//! Callback and observability handlers for LangChain-style pipelines.
//!
//! Handlers implement [`CallbackHandler`] and observe pipeline events: LLM
//! calls, chain and tool runs, streamed tokens, and agent decisions. A
//! [`CallbackManager`] fans each event out to the registered handlers.
//!
//! The crate root re-exports the public handler surface; that surface is
//! mirrored by [`exports::EXPORTED_NAMES`] and guarded by an export-set test,
//! so API changes to this list are always deliberate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use langchain_callbacks::manager::CallbackManager;
//! use langchain_callbacks::{get_openai_callback, StdOutCallbackHandler};
//!
//! let usage = get_openai_callback();
//!
//! let mut manager = CallbackManager::new();
//! manager.add_handler(Arc::new(StdOutCallbackHandler::new()));
//! manager.add_handler(usage.as_arc_handler());
//!
//! // ... run the pipeline, then:
//! assert_eq!(usage.successful_requests(), 0);
//! ```

pub mod base;
pub mod error;
pub mod exports;
pub mod file;
pub mod human;
pub mod integrations;
pub mod manager;
pub mod openai_info;
pub mod outputs;
pub mod stdout;
pub mod streaming_aiter;
pub mod streaming_stdout;
pub mod streamlit;
pub mod tracers;

pub use error::{Error, Result};

pub use base::{ArcCallbackHandler, CallbackHandler};
pub use manager::CallbackManager;

// The public handler surface. Keep in sync with `exports::EXPORTED_NAMES`.
pub use file::FileCallbackHandler;
pub use human::HumanApprovalCallbackHandler;
pub use integrations::{
    AimCallbackHandler, ArgillaCallbackHandler, ArizeCallbackHandler, ArthurCallbackHandler,
    ClearMLCallbackHandler, CometCallbackHandler, ContextCallbackHandler, FlyteCallbackHandler,
    InfinoCallbackHandler, LLMonitorCallbackHandler, LabelStudioCallbackHandler,
    MlflowCallbackHandler, PromptLayerCallbackHandler, SageMakerCallbackHandler,
    TrubricsCallbackHandler, WandbCallbackHandler, WhyLabsCallbackHandler,
};
pub use openai_info::{get_openai_callback, OpenAICallbackHandler};
pub use stdout::StdOutCallbackHandler;
pub use streaming_aiter::AsyncIteratorCallbackHandler;
pub use streaming_stdout::{FinalStreamingStdOutCallbackHandler, StreamingStdOutCallbackHandler};
pub use streamlit::{LLMThoughtLabeler, StreamlitCallbackHandler};
pub use tracers::{collect_runs, tracing_v2_enabled, wandb_tracing_enabled, LangChainTracer};
