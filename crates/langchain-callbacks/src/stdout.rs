//! Callback handler that prints to stdout.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::base::{serialized_name, CallbackHandler};
use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish};

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Shared writer used by console handlers. Tests swap it for a buffer.
pub(crate) type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

pub(crate) fn stdout_writer() -> SharedWriter {
    Arc::new(Mutex::new(Box::new(io::stdout())))
}

fn write_text(writer: &SharedWriter, text: &str, color: Option<&str>, end: &str) {
    if let Ok(mut w) = writer.lock() {
        if let Some(c) = color {
            let _ = write!(w, "{}{}{}{}", c, text, colors::RESET, end);
        } else {
            let _ = write!(w, "{}{}", text, end);
        }
        let _ = w.flush();
    }
}

/// Callback handler that prints chain progress to stdout.
#[derive(Clone)]
pub struct StdOutCallbackHandler {
    /// Default color for emitted text.
    pub color: Option<String>,
    writer: SharedWriter,
}

impl std::fmt::Debug for StdOutCallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdOutCallbackHandler")
            .field("color", &self.color)
            .finish()
    }
}

impl Default for StdOutCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StdOutCallbackHandler {
    /// Create a handler writing to stdout.
    pub fn new() -> Self {
        Self {
            color: None,
            writer: stdout_writer(),
        }
    }

    /// Create a handler with a default text color.
    pub fn with_color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            writer: stdout_writer(),
        }
    }

    /// Create a handler with a custom writer.
    pub fn with_writer(writer: SharedWriter) -> Self {
        Self {
            color: None,
            writer,
        }
    }
}

impl CallbackHandler for StdOutCallbackHandler {
    fn name(&self) -> &str {
        "StdOutCallbackHandler"
    }

    fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let name = serialized_name(serialized);
        write_text(
            &self.writer,
            &format!(
                "\n\n{}> Entering new {} chain...{}",
                colors::BOLD,
                name,
                colors::RESET
            ),
            None,
            "\n",
        );
        Ok(())
    }

    fn on_chain_end(&self, _outputs: &HashMap<String, Value>, _run_id: Uuid) -> Result<()> {
        write_text(
            &self.writer,
            &format!("\n{}> Finished chain.{}", colors::BOLD, colors::RESET),
            None,
            "\n",
        );
        Ok(())
    }

    fn on_tool_end(&self, output: &str, _run_id: Uuid) -> Result<()> {
        write_text(&self.writer, output, self.color.as_deref(), "\n");
        Ok(())
    }

    fn on_text(&self, text: &str, _run_id: Uuid) -> Result<()> {
        write_text(&self.writer, text, self.color.as_deref(), "");
        Ok(())
    }

    fn on_agent_action(&self, action: &AgentAction, _run_id: Uuid) -> Result<()> {
        write_text(&self.writer, &action.log, self.color.as_deref(), "");
        Ok(())
    }

    fn on_agent_finish(&self, finish: &AgentFinish, _run_id: Uuid) -> Result<()> {
        write_text(&self.writer, &finish.log, self.color.as_deref(), "\n");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A writer that collects everything written into a shared string buffer.
    #[derive(Clone, Default)]
    pub struct CaptureBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl CaptureBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub fn capture_writer() -> (SharedWriter, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        let writer: SharedWriter =
            Arc::new(Mutex::new(Box::new(CaptureWriter(buffer.0.clone()))));
        (writer, buffer)
    }
}
