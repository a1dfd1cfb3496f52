//! Behavior of the export-set validator against the real registry.

use langchain_callbacks::exports::{check_exports, EXPORTED_NAMES};
use langchain_callbacks::Error;

fn expect_mismatch(result: Result<(), Error>) -> (Vec<String>, Vec<String>) {
    match result {
        Err(Error::ExportMismatch {
            missing,
            unexpected,
        }) => (missing, unexpected),
        other => panic!("expected ExportMismatch, got {:?}", other),
    }
}

#[test]
fn test_declaration_order_is_irrelevant() {
    let mut shuffled: Vec<&str> = EXPORTED_NAMES.to_vec();
    shuffled.reverse();
    assert!(check_exports(shuffled, EXPORTED_NAMES.iter().copied()).is_ok());
}

#[test]
fn test_removed_export_reported_as_missing() {
    let actual: Vec<&str> = EXPORTED_NAMES
        .iter()
        .copied()
        .filter(|name| *name != "OpenAICallbackHandler")
        .collect();

    let (missing, unexpected) =
        expect_mismatch(check_exports(actual, EXPORTED_NAMES.iter().copied()));
    assert_eq!(missing, vec!["OpenAICallbackHandler".to_string()]);
    assert!(unexpected.is_empty());
}

#[test]
fn test_added_export_reported_as_unexpected() {
    let mut actual: Vec<&str> = EXPORTED_NAMES.to_vec();
    actual.push("BrandNewCallbackHandler");

    let (missing, unexpected) =
        expect_mismatch(check_exports(actual, EXPORTED_NAMES.iter().copied()));
    assert!(missing.is_empty());
    assert_eq!(unexpected, vec!["BrandNewCallbackHandler".to_string()]);
}

#[test]
fn test_renamed_export_reported_on_both_sides() {
    let actual: Vec<&str> = EXPORTED_NAMES
        .iter()
        .copied()
        .map(|name| {
            if name == "WandbCallbackHandler" {
                "WeightsAndBiasesCallbackHandler"
            } else {
                name
            }
        })
        .collect();

    let (missing, unexpected) =
        expect_mismatch(check_exports(actual, EXPORTED_NAMES.iter().copied()));
    assert_eq!(missing, vec!["WandbCallbackHandler".to_string()]);
    assert_eq!(
        unexpected,
        vec!["WeightsAndBiasesCallbackHandler".to_string()]
    );
}

#[test]
fn test_mismatch_message_names_the_offenders() {
    let actual: Vec<&str> = EXPORTED_NAMES
        .iter()
        .copied()
        .filter(|name| *name != "OpenAICallbackHandler")
        .collect();

    let err = check_exports(actual, EXPORTED_NAMES.iter().copied()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("OpenAICallbackHandler"));
    assert!(message.contains("export surface mismatch"));
}
