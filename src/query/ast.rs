//! Compiled Query Types
//!
//! Defines what the compiler produces from a token sequence: the filter
//! clauses that select rows and the directives that shape the output.
//!
//! # Example Queries
//!
//! ```text
//! tasks @webapp p1 due:eow
//! tasks #review -#blocked cols:id,text,time_week sort:time_week-
//! projects metrics:task_count,overdue_task_count group:status
//! ```

use crate::records::Domain;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Comparison operators for priority filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    /// Equal to
    Eq,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
}

impl ComparisonOp {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "" | "=" | "==" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            _ => None,
        }
    }

    /// Compare two numeric levels
    pub fn compare(&self, a: u8, b: u8) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
            Self::Gt => a > b,
            Self::Gte => a >= b,
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
        }
    }
}

/// A due-date expression, resolved against "today" at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DueKind {
    /// Due exactly today
    Today,
    /// Due exactly tomorrow
    Tomorrow,
    /// Due within the next N days
    WithinDays { days: u32 },
    /// Due on or before the coming Sunday
    EndOfWeek,
    /// Due on or before the last day of this month
    EndOfMonth,
    /// Due within the next N months
    WithinMonths { months: u32 },
    /// Due exactly on a calendar date
    On { date: NaiveDate },
    /// Due exactly on a month/day, year picked relative to today
    MonthDay { month: u32, day: u32 },
}

/// One filter predicate; a row must satisfy every clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum FilterClause {
    ProjectEquals { project: String },
    PriorityCompare { op: ComparisonOp, value: u8 },
    PriorityRange { lo: u8, hi: u8 },
    DueRelative { due: DueKind },
    Overdue,
    StatusEquals { status: String },
    TagPresent { tag: String, negated: bool },
    TextContains { term: String },
}

impl FilterClause {
    /// Whether this clause constrains the due date
    pub fn is_due(&self) -> bool {
        matches!(self, FilterClause::DueRelative { .. } | FilterClause::Overdue)
    }

    /// Whether this clause constrains priority
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            FilterClause::PriorityCompare { .. } | FilterClause::PriorityRange { .. }
        )
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One link of the sort tie-break chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Presentation hint for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    List,
    Kanban,
}

impl View {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "list" => Some(Self::List),
            "kanban" => Some(Self::Kanban),
            _ => None,
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["list", "kanban"]
    }
}

/// Output-shaping directives
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryDirectives {
    /// Explicit column list, `None` for the domain default
    pub columns: Option<Vec<String>>,
    /// Sort tie-break chain, empty when unset
    pub sort: Vec<SortKey>,
    pub metrics: BTreeSet<String>,
    pub with: BTreeSet<String>,
    pub group: Option<String>,
    /// `None` until set explicitly or by a smart default
    pub view: Option<View>,
    /// Name to store the raw query text under
    pub save: Option<String>,
}

/// A parsed and validated query ready for evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub domain: Domain,
    pub filters: Vec<FilterClause>,
    pub directives: QueryDirectives,
}

impl CompiledQuery {
    /// Create an unfiltered query over a domain
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            filters: Vec::new(),
            directives: QueryDirectives::default(),
        }
    }

    /// Builder: add a filter
    pub fn filter(mut self, clause: FilterClause) -> Self {
        self.filters.push(clause);
        self
    }

    /// Builder: append a sort key
    pub fn sort(mut self, key: SortKey) -> Self {
        self.directives.sort.push(key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_op() {
        assert_eq!(ComparisonOp::from_str("<="), Some(ComparisonOp::Lte));
        assert_eq!(ComparisonOp::from_str(""), Some(ComparisonOp::Eq));
        assert_eq!(ComparisonOp::from_str("=>"), None);

        assert!(ComparisonOp::Lte.compare(2, 2));
        assert!(ComparisonOp::Gt.compare(3, 2));
        assert!(!ComparisonOp::Lt.compare(2, 2));
    }

    #[test]
    fn test_clause_shape() {
        assert!(FilterClause::Overdue.is_due());
        assert!(FilterClause::DueRelative { due: DueKind::Today }.is_due());
        assert!(FilterClause::PriorityRange { lo: 1, hi: 2 }.is_priority());
        assert!(!FilterClause::TextContains { term: "x".into() }.is_priority());
    }

    #[test]
    fn test_view_parse() {
        assert_eq!(View::from_str("Kanban"), Some(View::Kanban));
        assert_eq!(View::from_str("grid"), None);
        assert_eq!(View::default(), View::List);
    }
}
