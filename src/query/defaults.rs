//! Smart defaults
//!
//! Fills directive fields the user left unset, based only on the shape of
//! the filter list. Each rule is checked against the original filters and
//! directives, so rules never see each other's output.

use crate::query::ast::{FilterClause, QueryDirectives, SortKey, View};

/// Resolve unset `sort` and `view` from the filter shape
pub fn resolve_defaults(filters: &[FilterClause], directives: &QueryDirectives) -> QueryDirectives {
    let mut resolved = directives.clone();

    if directives.sort.is_empty() {
        if filters.iter().any(FilterClause::is_due) {
            resolved.sort.push(SortKey::asc("due"));
        }
        if filters.iter().any(FilterClause::is_priority) {
            resolved.sort.push(SortKey::desc("priority"));
        }
    }

    if directives.view.is_none() && directives.group.as_deref() == Some("status") {
        resolved.view = Some(View::Kanban);
    }

    resolved
}
