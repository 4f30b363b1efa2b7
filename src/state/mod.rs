//! Run state and its persistence

mod snapshot;
mod store;

pub use snapshot::{JsonMap, RunState};
pub use store::{FileStore, StateError, StateStore};

#[cfg(test)]
pub use store::memory::MemoryStore;
