//! Export-surface registry and validator.
//!
//! Rust has no runtime reflection over a module's re-exports, so the crate
//! keeps an explicit registry: [`EXPORTED_NAMES`] lists every identifier the
//! crate root re-exports, one-to-one with the `pub use` block in `lib.rs`.
//! The two must change together; the `unit_tests` suite compares the registry
//! against a hard-coded reference list so that adding, removing, or renaming
//! a public name is always a deliberate, reviewed change.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// The names re-exported from the crate root.
///
/// Keep in sync with the `pub use` block in `lib.rs`.
pub const EXPORTED_NAMES: &[&str] = &[
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

/// Check that a declared export surface exactly equals an expected reference
/// set.
///
/// Both collections are interpreted as sets: order is irrelevant and the check
/// is binary. On mismatch the error carries the symmetric difference, split
/// into names missing from `actual` and names unexpected in it, both sorted.
pub fn check_exports<'a, A, E>(actual: A, expected: E) -> Result<()>
where
    A: IntoIterator<Item = &'a str>,
    E: IntoIterator<Item = &'a str>,
{
    let actual: HashSet<&str> = actual.into_iter().collect();
    let expected: HashSet<&str> = expected.into_iter().collect();

    if actual == expected {
        return Ok(());
    }

    let mut missing: Vec<String> = expected
        .difference(&actual)
        .map(|s| s.to_string())
        .collect();
    let mut unexpected: Vec<String> = actual
        .difference(&expected)
        .map(|s| s.to_string())
        .collect();
    missing.sort();
    unexpected.sort();

    Err(Error::export_mismatch(missing, unexpected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_no_duplicates() {
        let unique: HashSet<&str> = EXPORTED_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), EXPORTED_NAMES.len());
    }

    #[test]
    fn test_equal_sets_pass() {
        assert!(check_exports(["a", "b"], ["b", "a"]).is_ok());
    }

    #[test]
    fn test_missing_name_reported() {
        let err = check_exports(["a"], ["a", "b"]).unwrap_err();
        match err {
            Error::ExportMismatch {
                missing,
                unexpected,
            } => {
                assert_eq!(missing, vec!["b".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_name_reported() {
        let err = check_exports(["a", "b", "c"], ["a", "b"]).unwrap_err();
        match err {
            Error::ExportMismatch {
                missing,
                unexpected,
            } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["c".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_diagnostic_is_sorted() {
        let err = check_exports(["z", "y"], ["b", "a"]).unwrap_err();
        match err {
            Error::ExportMismatch {
                missing,
                unexpected,
            } => {
                assert_eq!(missing, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(unexpected, vec!["y".to_string(), "z".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
