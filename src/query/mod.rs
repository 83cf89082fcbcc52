//! Tasklens Query Engine
//!
//! Provides a compact query language over tasks, projects and time logs:
//!
//! - **Lexer**: Split query strings into classified tokens
//! - **Compiler**: Turn tokens into filter clauses and output directives
//! - **Defaults**: Infer sort and view from the filter shape
//! - **Metrics**: Join related records into computed per-row values
//! - **Executor**: Filter, relate, compute, project, sort and group
//! - **Engine**: Tie the stages together with `save:` / `load:`
//!
//! # Query Language
//!
//! ```text
//! <domain> [filter-token]* [directive-token]*
//!
//! domain     tasks | projects | timelogs
//! filters    @project  p1  p<=2  p1..3  due:eow  overdue  status:done  #tag  -#tag  word  "a phrase"
//! directives cols:a,b  sort:a+,b-  metrics:m  with:r  group:f  view:list|kanban  save:n  load:n
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use tasklens::query::QueryEngine;
//! use tasklens::store::SavedQueryStore;
//!
//! let engine = QueryEngine::new(Arc::new(SavedQueryStore::in_memory()));
//! let output = engine.run("tasks @webapp p<=2 due:eow cols:id,text,time_week", &source, today)?;
//!
//! for row in &output.rows {
//!     println!("{:?}", row.cells);
//! }
//! ```

mod ast;
mod compiler;
mod dates;
mod defaults;
mod engine;
mod error;
mod executor;
mod lexer;
mod metrics;
mod schema;

pub use ast::{
    CompiledQuery, ComparisonOp, DueKind, FilterClause, QueryDirectives, SortDirection, SortKey,
    View,
};
pub use compiler::{compile, parse_priority, Compilation, DIRECTIVES};
pub use dates::{parse_due, DateWindow, EvalContext, PastMonthDay};
pub use defaults::resolve_defaults;
pub use engine::QueryEngine;
pub use error::{
    CompileError, DomainMismatchError, LexError, LoadError, QueryError, QueryResult,
};
pub use executor::{
    evaluate, field_value, QueryExecutor, QueryOutput, ResultGroup, ResultRow, Value, NO_GROUP,
};
pub use lexer::{classify, lex, Token, TokenKind, MATCHERS};
pub use metrics::{MetricEngine, RelationIndex};
pub use schema::{schema, DomainSchema, FilterKind, PROJECT_SCHEMA, TASK_SCHEMA, TIMELOG_SCHEMA};
