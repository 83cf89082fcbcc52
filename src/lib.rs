//! # Tasklens
//!
//! A query language for personal task data: filter, sort, project and
//! compute metrics over tasks, projects and time logs.
//!
//! ## Modules
//!
//! - [`records`]: Record types and the read-only record source
//! - [`query`]: Lexer, compiler, smart defaults, metrics and evaluator
//! - [`store`]: Saved queries and run history
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasklens::{QueryEngine, RecordSource, SavedQueryStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = RecordSource::load_dir(std::path::Path::new("./data"))?;
//!     let store = Arc::new(SavedQueryStore::open("./data/queries.json")?);
//!     let engine = QueryEngine::new(store);
//!
//!     let today = chrono::Local::now().date_naive();
//!     let output = engine.run("tasks @webapp p<=2 due:eow save:focus", &source, today)?;
//!
//!     println!("Found {} tasks", output.rows.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod query;
pub mod records;
pub mod store;

// Re-export top-level types for convenience
pub use records::{
    Domain, Priority, Project, ProjectStatus, RecordRef, RecordSource, SourceError, Task,
    TaskStatus, TimeLog,
};

pub use query::{
    CompiledQuery, EvalContext, PastMonthDay, QueryEngine, QueryError, QueryOutput, QueryResult,
    ResultRow, Value,
};

pub use store::{SavedQuery, SavedQueryStore, StoreError};

pub use config::{Config, ConfigError, LoggingConfig};
