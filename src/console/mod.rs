//! Injected I/O capabilities
//!
//! The loop never touches stdout, stdin, or the result file directly. It
//! talks to these seams, so tests can substitute recording fakes and hosts
//! can redirect output wherever they like.

use std::path::PathBuf;
use std::sync::Mutex;

use colored::Colorize;
use eyre::{Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::state::JsonMap;

/// Sink for human-readable run output
pub trait Output: Send + Sync {
    /// A status line (load/save notices, task lifecycle)
    fn status(&self, message: &str);

    /// A "thoughts" string the model chose to surface
    fn thought(&self, message: &str);
}

/// One-line question/answer capability
pub trait Input: Send + Sync {
    fn ask(&self, prompt: &str) -> Result<String>;
}

/// Invoked exactly once with the goal and final result when a run completes
pub trait CompletionSink: Send + Sync {
    fn complete(&self, goal: &str, result: &JsonMap) -> Result<()>;
}

/// Console output with a verbosity gate on status lines
pub struct ConsoleOutput {
    verbose: bool,
}

impl ConsoleOutput {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Output for ConsoleOutput {
    fn status(&self, message: &str) {
        if self.verbose {
            println!("{} {}", "[system]".dimmed(), message);
        }
    }

    fn thought(&self, message: &str) {
        println!("{} {}", "thoughts:".bright_cyan(), message);
    }
}

/// Console input backed by readline
pub struct ConsoleInput {
    editor: Mutex<DefaultEditor>,
}

impl ConsoleInput {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| eyre!("Failed to initialize readline: {}", e))?;
        Ok(Self {
            editor: Mutex::new(editor),
        })
    }
}

impl Input for ConsoleInput {
    fn ask(&self, prompt: &str) -> Result<String> {
        let mut editor = self.editor.lock().map_err(|_| eyre!("input editor lock poisoned"))?;
        match editor.readline(prompt) {
            Ok(line) => Ok(line),
            // Ctrl+C / Ctrl+D read as an empty (non-affirmative) answer
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(String::new()),
            Err(e) => Err(eyre!("Readline error: {}", e)),
        }
    }
}

/// Writes the final result to `<goal-with-underscores>.result.txt`
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CompletionSink for FileSink {
    fn complete(&self, goal: &str, result: &JsonMap) -> Result<()> {
        let file_name = format!("{}.result.txt", goal.replace(' ', "_"));
        let path = self.dir.join(file_name);
        println!("saving final result to {}", path.display());

        let content = serde_json::to_string(&serde_json::Value::Object(result.clone()))?;
        std::fs::write(&path, content).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_sink_writes_result_file() {
        let temp = tempfile::tempdir().unwrap();
        let sink = FileSink::new(temp.path());

        let mut result = JsonMap::new();
        result.insert("colors".to_string(), json!(["red", "green", "blue"]));

        sink.complete("list three colors", &result).unwrap();

        let path = temp.path().join("list_three_colors.result.txt");
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["colors"][1], "green");
    }

    #[test]
    fn test_scripted_input_drains_then_defaults_empty() {
        let input = fake::ScriptedInput::new(&["y", "n"]);
        assert_eq!(input.ask("?").unwrap(), "y");
        assert_eq!(input.ask("?").unwrap(), "n");
        assert_eq!(input.ask("?").unwrap(), "");
    }
}
