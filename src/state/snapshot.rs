//! RunState - the typed record a run carries between cycles

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// A JSON object keyed by strings, the shape of stored info and final result
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// The state a run accumulates across cycles
///
/// This is exactly what gets persisted: four fields, serialized as a single
/// JSON document with four top-level keys. Missing keys deserialize to their
/// empty values, so a partial or older snapshot still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    /// Carry-over context accumulated across tasks
    pub stored_info: JsonMap,

    /// The evolving answer document returned on completion
    pub final_result: JsonMap,

    /// Ordered task queue; the front task executes next
    pub current_tasks: VecDeque<String>,

    /// Completed task -> its textual result
    pub completed_tasks: BTreeMap<String, String>,
}

impl RunState {
    /// Combined stored info and final result, for task prompt context
    pub fn context_block(&self) -> String {
        format!(
            "stored_info: {} final_result: {}",
            serde_json::Value::Object(self.stored_info.clone()),
            serde_json::Value::Object(self.final_result.clone()),
        )
    }

    /// Current task queue serialized as a JSON array
    pub fn tasks_json(&self) -> String {
        serde_json::to_string(&self.current_tasks).unwrap_or_else(|_| "[]".to_string())
    }
}
