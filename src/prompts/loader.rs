//! Prompt Loader
//!
//! Loads prompt templates from override files or falls back to embedded
//! defaults, and renders them with Handlebars. Rendering is pure: state in,
//! prompt string out. Transport lives elsewhere.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for the base (system) prompt
#[derive(Debug, Clone, Serialize)]
pub struct BaseContext {
    /// Rendered tool listing block
    pub tools: String,
    /// The final goal
    pub goal: String,
    /// Current task queue, serialized as JSON
    pub current_tasks: String,
    /// Stored info, serialized as JSON
    pub stored_info: String,
    /// Final result, serialized as JSON
    pub final_result: String,
}

/// Context for the task execution prompt
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext {
    pub goal: String,
    /// Tasks remaining after this one, serialized as JSON
    pub remaining_tasks: String,
    pub task: String,
    /// Combined stored info and final result
    pub context: String,
}

/// Context for the refine prompt
#[derive(Debug, Clone, Serialize)]
pub struct RefineContext {
    pub task: String,
    pub result: String,
}

/// Context for the JSON repair prompt
#[derive(Debug, Clone, Serialize)]
pub struct RepairContext {
    pub example: String,
    pub bad_json: String,
    pub error: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.goalrunner/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader rooted at the given directory
    ///
    /// Overrides are read from `<root>/.goalrunner/prompts/{name}.pmt`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let override_dir = root.as_ref().join(".goalrunner/prompts");

        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes
        hbs.register_escape_fn(handlebars::no_escape);

        Self {
            hbs,
            override_dir: override_dir.exists().then_some(override_dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            override_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks the user override directory first, then the embedded fallback.
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from user override: {:?}", path);
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String> {
        let template = self.load_template(template_name)?;

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Load a variable-free template verbatim
    pub fn text(&self, template_name: &str) -> Result<String> {
        self.load_template(template_name)
    }
}
