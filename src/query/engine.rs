//! Query Engine
//!
//! Entry point for running a query string end to end:
//!
//! ```text
//! text → lex → compile ─┬─ Ready ──────────────────────┬→ save: → defaults → evaluate
//!                       └─ Load → stored text → lex → compile
//! ```
//!
//! `load:<name>` replaces the whole invocation with the stored text; any
//! other tokens next to it are discarded with a warning.

use crate::query::ast::CompiledQuery;
use crate::query::compiler::{compile, Compilation};
use crate::query::dates::{EvalContext, PastMonthDay};
use crate::query::defaults::resolve_defaults;
use crate::query::error::{CompileError, LoadError, QueryResult};
use crate::query::executor::{evaluate, QueryOutput};
use crate::query::lexer::lex;
use crate::records::RecordSource;
use crate::store::SavedQueryStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiles and runs query strings against a saved query store
pub struct QueryEngine {
    store: Arc<SavedQueryStore>,
    past_month_day: PastMonthDay,
}

impl QueryEngine {
    /// Create an engine backed by a saved query store
    pub fn new(store: Arc<SavedQueryStore>) -> Self {
        Self {
            store,
            past_month_day: PastMonthDay::default(),
        }
    }

    /// Builder: set the `due:mmdd` rollover policy
    pub fn past_month_day(mut self, policy: PastMonthDay) -> Self {
        self.past_month_day = policy;
        self
    }

    pub fn store(&self) -> &SavedQueryStore {
        &self.store
    }

    /// Compile a query string, resolving `load:` but without side effects
    pub fn compile(&self, text: &str) -> QueryResult<CompiledQuery> {
        self.resolve(text).map(|(query, _)| query)
    }

    /// Compile and return the text the query came from (the stored text for `load:`)
    fn resolve(&self, text: &str) -> QueryResult<(CompiledQuery, String)> {
        let (name, discarded) = match compile(&lex(text)?)? {
            Compilation::Ready(query) => return Ok((query, text.to_string())),
            Compilation::Load { name, discarded } => (name, discarded),
        };

        if !discarded.is_empty() {
            warn!(name = %name, discarded = ?discarded, "load: replaces the whole query; ignoring other tokens");
        }

        let stored = match self.store.load(&name)? {
            Some(stored) => stored,
            None => {
                return Err(LoadError::NotFound {
                    available: self.store.names()?,
                    name,
                }
                .into())
            }
        };

        match compile(&lex(&stored)?)? {
            Compilation::Ready(query) => {
                info!(name = %name, "Loaded saved query");
                Ok((query, stored))
            }
            Compilation::Load { .. } => Err(CompileError::NestedLoad { name }.into()),
        }
    }

    /// Compile, persist `save:` and history, then fill smart defaults
    pub fn prepare(&self, text: &str) -> QueryResult<CompiledQuery> {
        let (query, source_text) = self.resolve(text)?;

        if let Some(name) = &query.directives.save {
            self.store.save(name, &source_text)?;
        }
        self.store.record_history(text)?;

        let directives = resolve_defaults(&query.filters, &query.directives);
        debug!(domain = %query.domain, filters = query.filters.len(), "Query prepared");

        Ok(CompiledQuery {
            directives,
            ..query
        })
    }

    /// Run a query string against a record source
    pub fn run<'a>(
        &self,
        text: &str,
        source: &'a RecordSource,
        today: NaiveDate,
    ) -> QueryResult<QueryOutput<'a>> {
        let query = self.prepare(text)?;
        let ctx = EvalContext::new(today).past_month_day(self.past_month_day);
        evaluate(&query, source, &ctx)
    }
}
