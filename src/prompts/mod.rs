//! Prompt templates and rendering

pub mod embedded;
mod loader;

pub use embedded::GOOD_JSON_EXAMPLE;
pub use loader::{BaseContext, PromptLoader, RefineContext, RepairContext, TaskContext};
