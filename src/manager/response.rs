//! Typed model responses
//!
//! Every structured model reply deserializes into one of these records.
//! Required keys are enforced by serde: a reply missing them fails to parse
//! and goes through the repair path instead of silently half-applying.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::state::JsonMap;

/// Reply to the create prompt
#[derive(Debug, Clone, Deserialize)]
pub struct TaskListResponse {
    pub current_tasks: Vec<String>,
}

/// Reply to the refine prompt
///
/// `current_tasks` and `goal_complete` must be present. The maps are
/// optional: a field the model did not return leaves the in-memory value
/// untouched rather than wiping it.
#[derive(Debug, Clone, Deserialize)]
pub struct RefineResponse {
    pub current_tasks: Vec<String>,
    #[serde(default)]
    pub stored_info: Option<JsonMap>,
    #[serde(default)]
    pub final_result: Option<JsonMap>,
    #[serde(default)]
    pub thoughts: Option<String>,
    pub goal_complete: bool,
}

/// Reply to the completion check prompt
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionCheck {
    pub final_result: JsonMap,
    pub goal_complete: bool,
    #[serde(default)]
    pub current_tasks: Vec<String>,
}

/// Slice the JSON out of a model reply
///
/// Models wrap JSON in markdown fences or prose often enough that a strict
/// parse of the raw text would waste repair calls. Prefer a fenced block,
/// then the outermost brace pair, then the trimmed text as-is.
pub fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    if let Some(start) = text.find('{')
        && let Some(end) = text.rfind('}')
        && end > start
    {
        return text[start..=end].trim();
    }
    text.trim()
}

/// Parse a model reply into a typed response
pub fn parse<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json(text))
}
