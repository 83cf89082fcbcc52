//! Tasklens Records
//!
//! The read-only data the query engine works over:
//!
//! - **types**: `Task`, `Project`, `TimeLog` and the `Domain` they belong to
//! - **source**: `RecordSource`, the in-memory collections handed to the evaluator
//! - **error**: Error types for loading collections
//!
//! The engine never mutates records; it borrows them as `RecordRef` for the
//! lifetime of one evaluation.

pub mod error;
pub mod source;
pub mod types;

pub use error::{SourceError, SourceResult};
pub use source::RecordSource;
pub use types::{Domain, Priority, Project, ProjectStatus, RecordRef, Task, TaskStatus, TimeLog};
