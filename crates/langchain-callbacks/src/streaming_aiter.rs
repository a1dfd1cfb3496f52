//! Callback handler that bridges streamed tokens into a `futures::Stream`.
//!
//! Tokens are pushed over an unbounded channel; `None` is the close sentinel,
//! sent when the LLM call ends or errors.

use std::sync::Mutex;

use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::base::CallbackHandler;
use crate::error::Result;
use crate::outputs::LlmResult;

/// Callback handler that exposes streamed tokens as an async iterator.
///
/// The stream can be taken once with [`into_stream`](Self::into_stream);
/// the handler side stays usable afterwards.
#[derive(Debug)]
pub struct AsyncIteratorCallbackHandler {
    sender: mpsc::UnboundedSender<Option<String>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Option<String>>>>,
}

impl Default for AsyncIteratorCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncIteratorCallbackHandler {
    /// Create a handler with a fresh token channel.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Take the token stream. Returns `None` if it was already taken.
    ///
    /// The stream yields tokens until the handler observes `on_llm_end` or
    /// `on_llm_error`.
    pub fn into_stream(&self) -> Option<impl Stream<Item = String>> {
        let receiver = self.receiver.lock().unwrap().take()?;
        Some(futures::stream::unfold(receiver, |mut rx| async move {
            match rx.recv().await {
                Some(Some(token)) => Some((token, rx)),
                // Close sentinel or all senders dropped.
                Some(None) | None => None,
            }
        }))
    }

    fn close(&self) {
        let _ = self.sender.send(None);
    }
}

impl CallbackHandler for AsyncIteratorCallbackHandler {
    fn name(&self) -> &str {
        "AsyncIteratorCallbackHandler"
    }

    fn on_llm_new_token(&self, token: &str, _run_id: Uuid) -> Result<()> {
        let _ = self.sender.send(Some(token.to_string()));
        Ok(())
    }

    fn on_llm_end(&self, _result: &LlmResult, _run_id: Uuid) -> Result<()> {
        self.close();
        Ok(())
    }

    fn on_llm_error(&self, _error: &str, _run_id: Uuid) -> Result<()> {
        self.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_tokens_flow_through_stream() {
        let handler = AsyncIteratorCallbackHandler::new();
        let stream = handler.into_stream().unwrap();

        let run_id = Uuid::new_v4();
        handler.on_llm_new_token("a", run_id).unwrap();
        handler.on_llm_new_token("b", run_id).unwrap();
        handler.on_llm_end(&LlmResult::default(), run_id).unwrap();

        let tokens: Vec<String> = stream.collect().await;
        assert_eq!(tokens, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_error_closes_stream() {
        let handler = AsyncIteratorCallbackHandler::new();
        let stream = handler.into_stream().unwrap();

        let run_id = Uuid::new_v4();
        handler.on_llm_new_token("partial", run_id).unwrap();
        handler.on_llm_error("rate limited", run_id).unwrap();

        let tokens: Vec<String> = stream.collect().await;
        assert_eq!(tokens, vec!["partial".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_can_only_be_taken_once() {
        let handler = AsyncIteratorCallbackHandler::new();
        assert!(handler.into_stream().is_some());
        assert!(handler.into_stream().is_none());
    }
}
