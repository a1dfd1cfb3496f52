//! Guards the crate's public export surface.
//!
//! The reference list below is the contract: changing the exports of the
//! crate root without updating this list (or vice versa) fails the test, so
//! the public API never drifts silently.

use langchain_callbacks::exports::{check_exports, EXPORTED_NAMES};

const EXPECTED_ALL: &[&str] = &[
    "AimCallbackHandler",
    "ArgillaCallbackHandler",
    "ArizeCallbackHandler",
    "PromptLayerCallbackHandler",
    "ArthurCallbackHandler",
    "ClearMLCallbackHandler",
    "CometCallbackHandler",
    "ContextCallbackHandler",
    "FileCallbackHandler",
    "HumanApprovalCallbackHandler",
    "InfinoCallbackHandler",
    "MlflowCallbackHandler",
    "LLMonitorCallbackHandler",
    "OpenAICallbackHandler",
    "StdOutCallbackHandler",
    "AsyncIteratorCallbackHandler",
    "StreamingStdOutCallbackHandler",
    "FinalStreamingStdOutCallbackHandler",
    "LLMThoughtLabeler",
    "LangChainTracer",
    "StreamlitCallbackHandler",
    "WandbCallbackHandler",
    "WhyLabsCallbackHandler",
    "get_openai_callback",
    "tracing_v2_enabled",
    "collect_runs",
    "wandb_tracing_enabled",
    "FlyteCallbackHandler",
    "SageMakerCallbackHandler",
    "LabelStudioCallbackHandler",
    "TrubricsCallbackHandler",
];

#[test]
fn test_all_imports() {
    check_exports(
        EXPORTED_NAMES.iter().copied(),
        EXPECTED_ALL.iter().copied(),
    )
    .unwrap();
}

/// Every registered name must also be importable from the crate root
/// (compile-time check).
#[test]
fn test_registered_names_are_importable() {
    #[allow(unused_imports, clippy::single_component_path_imports)]
    fn _assert_importable() {
        use langchain_callbacks::{
            collect_runs, get_openai_callback, tracing_v2_enabled, wandb_tracing_enabled,
            AimCallbackHandler, ArgillaCallbackHandler, ArizeCallbackHandler,
            ArthurCallbackHandler, AsyncIteratorCallbackHandler, ClearMLCallbackHandler,
            CometCallbackHandler, ContextCallbackHandler, FileCallbackHandler,
            FinalStreamingStdOutCallbackHandler, FlyteCallbackHandler,
            HumanApprovalCallbackHandler, InfinoCallbackHandler, LLMThoughtLabeler,
            LLMonitorCallbackHandler, LabelStudioCallbackHandler, LangChainTracer,
            MlflowCallbackHandler, OpenAICallbackHandler, PromptLayerCallbackHandler,
            SageMakerCallbackHandler, StdOutCallbackHandler, StreamingStdOutCallbackHandler,
            StreamlitCallbackHandler, TrubricsCallbackHandler, WandbCallbackHandler,
            WhyLabsCallbackHandler,
        };
    }
}

#[test]
fn test_expected_count() {
    assert_eq!(EXPECTED_ALL.len(), 31);
    assert_eq!(EXPORTED_NAMES.len(), 31);
}
