//! Tasklens Saved Query Store
//!
//! Persists the raw text behind `save:<name>` so `load:<name>` can recompile
//! it later, along with a bounded history of executed queries.

mod error;
mod saved;

pub use error::{StoreError, StoreResult};
pub use saved::{SavedQuery, SavedQueryStore, DEFAULT_HISTORY_LIMIT, STORE_VERSION};
