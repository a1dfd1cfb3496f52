//! Human-in-the-loop approval handler.
//!
//! Gates tool execution on an approval predicate. Rejection surfaces as
//! [`Error::HumanRejected`](crate::error::Error::HumanRejected); the handler
//! reports `raise_error() == true` so the manager aborts the run instead of
//! logging the veto away.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::{Error, Result};

type ApproveFn = Box<dyn Fn(&str) -> bool + Send + Sync>;
type ShouldCheckFn = Box<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>;

/// Callback handler that requires human approval before a tool runs.
pub struct HumanApprovalCallbackHandler {
    approve: ApproveFn,
    should_check: ShouldCheckFn,
}

impl std::fmt::Debug for HumanApprovalCallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HumanApprovalCallbackHandler").finish()
    }
}

impl HumanApprovalCallbackHandler {
    /// Create a handler with an approval predicate over the tool input.
    ///
    /// Every tool start is checked; use [`with_should_check`](Self::with_should_check)
    /// to limit which tools require review.
    pub fn new(approve: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            approve: Box::new(approve),
            should_check: Box::new(|_| true),
        }
    }

    /// Restrict approval checks to tools whose serialized form matches the
    /// predicate.
    pub fn with_should_check(
        mut self,
        should_check: impl Fn(&HashMap<String, Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_check = Box::new(should_check);
        self
    }
}

impl CallbackHandler for HumanApprovalCallbackHandler {
    fn name(&self) -> &str {
        "HumanApprovalCallbackHandler"
    }

    fn raise_error(&self) -> bool {
        true
    }

    fn on_tool_start(
        &self,
        serialized: &HashMap<String, Value>,
        input_str: &str,
        _run_id: Uuid,
    ) -> Result<()> {
        if (self.should_check)(serialized) && !(self.approve)(input_str) {
            return Err(Error::human_rejected(input_str));
        }
        Ok(())
    }
}
