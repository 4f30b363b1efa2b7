//! Tool descriptors
//!
//! Tools are never dispatched by the loop. They are descriptors rendered
//! into prompt text so the models executing tasks know what is available.

use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// A named tool described to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Render the tool listing block embedded in prompts
///
/// Each descriptor renders as a `name:` line and a `description:` line;
/// entries are joined with a `-----` separator.
pub fn listing(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|t| format!("name: {}\ndescription: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("-----\n")
}

/// Load tool descriptors from a YAML file
///
/// The file is a sequence of `{name, description}` entries.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<ToolSpec>> {
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).context(format!("Failed to read tools file {}", path.display()))?;

    serde_yaml::from_str(&content).context(format!("Failed to parse tools file {}", path.display()))
}
