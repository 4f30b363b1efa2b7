//! TaskManager error types

use thiserror::Error;

use crate::llm::LlmError;
use crate::state::StateError;

/// Errors that can end a run cycle
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Model output stayed unparseable through every repair attempt
    #[error("model response was not valid JSON after {attempts} repair attempts: {source}")]
    MalformedResponse {
        attempts: u32,
        #[source]
        source: serde_json::Error,
    },

    /// The cycle guard tripped before the goal was reached
    #[error("goal not reached after {0} cycles")]
    CyclesExhausted(u32),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    State(#[from] StateError),

    /// An injected capability (prompt rendering, input, completion sink) failed
    #[error("capability failure: {0}")]
    Capability(String),
}

impl ManagerError {
    /// Check if this is a malformed-response error
    pub fn is_malformed(&self) -> bool {
        matches!(self, ManagerError::MalformedResponse { .. })
    }
}
