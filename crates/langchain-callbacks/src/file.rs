//! Callback handler that writes to a file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use crate::base::{serialized_name, CallbackHandler};
use crate::error::Result;
use crate::outputs::{AgentAction, AgentFinish};

/// Callback handler that logs chain execution to a file, for debugging or
/// auditing.
#[derive(Debug)]
pub struct FileCallbackHandler {
    path: String,
    writer: Mutex<BufWriter<File>>,
}

impl FileCallbackHandler {
    /// Open the output file, truncating it unless `append` is set.
    pub fn new<P: AsRef<Path>>(path: P, append: bool) -> Result<Self> {
        let file = if append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_ref())?
        } else {
            File::create(path.as_ref())?
        };

        Ok(Self {
            path: path.as_ref().to_string_lossy().to_string(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// The output file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn write(&self, text: &str, end: &str) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = write!(w, "{}{}", text, end);
            let _ = w.flush();
        }
    }

    /// Flush buffered output to disk.
    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .map_err(|_| crate::error::Error::other("file writer poisoned"))?
            .flush()?;
        Ok(())
    }
}

impl CallbackHandler for FileCallbackHandler {
    fn name(&self) -> &str {
        "FileCallbackHandler"
    }

    fn on_chain_start(
        &self,
        serialized: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        let name = serialized_name(serialized);
        self.write(&format!("\n\n> Entering new {} chain...", name), "\n");
        Ok(())
    }

    fn on_chain_end(&self, _outputs: &HashMap<String, Value>, _run_id: Uuid) -> Result<()> {
        self.write("\n> Finished chain.", "\n");
        Ok(())
    }

    fn on_tool_end(&self, output: &str, _run_id: Uuid) -> Result<()> {
        self.write(output, "\n");
        Ok(())
    }

    fn on_text(&self, text: &str, _run_id: Uuid) -> Result<()> {
        self.write(text, "");
        Ok(())
    }

    fn on_agent_action(&self, action: &AgentAction, _run_id: Uuid) -> Result<()> {
        self.write(&action.log, "");
        Ok(())
    }

    fn on_agent_finish(&self, finish: &AgentFinish, _run_id: Uuid) -> Result<()> {
        self.write(&finish.log, "\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_handler_creation() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("out.txt");

        let handler = FileCallbackHandler::new(&file_path, false).unwrap();
        assert_eq!(handler.name(), "FileCallbackHandler");
        assert!(handler.path().ends_with("out.txt"));
    }

    #[test]
    fn test_file_handler_append() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("append.txt");

        {
            let handler = FileCallbackHandler::new(&file_path, false).unwrap();
            handler.on_text("first\n", Uuid::new_v4()).unwrap();
            handler.flush().unwrap();
        }
        {
            let handler = FileCallbackHandler::new(&file_path, true).unwrap();
            handler.on_text("second\n", Uuid::new_v4()).unwrap();
            handler.flush().unwrap();
        }

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_file_handler_chain_lifecycle() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("chain.txt");

        {
            let handler = FileCallbackHandler::new(&file_path, false).unwrap();

            let mut serialized = HashMap::new();
            serialized.insert("name".to_string(), json!("TestChain"));

            let run_id = Uuid::new_v4();
            handler
                .on_chain_start(&serialized, &HashMap::new(), run_id, None)
                .unwrap();
            handler.on_chain_end(&HashMap::new(), run_id).unwrap();
            handler.flush().unwrap();
        }

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.contains("Entering new TestChain chain"));
        assert!(content.contains("Finished chain"));
    }
}
