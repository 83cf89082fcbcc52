//! Query error types
//!
//! Defines every validation failure the lexer, compiler and saved query
//! lookup can report. All of them are recoverable: they are returned as
//! values so the caller can show the message, offer the `suggestions()` list
//! and let the user resubmit a corrected query.

use crate::records::Domain;
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised while splitting a query string into tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A `"` was opened but never closed
    #[error("Unterminated quote at position {position}: {fragment}")]
    UnterminatedQuote { fragment: String, position: usize },

    /// A directive with an empty value list or an empty list entry
    #[error("Malformed directive list at position {position}: {fragment}")]
    MalformedDirective { fragment: String, position: usize },
}

/// Errors raised while compiling tokens into filters and directives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Priority outside 1..3, non-numeric, or an inverted range
    #[error("Invalid priority '{token}': expected p1..p3, p<=N, p>=N or pA..B with values 1-3")]
    InvalidPriority { token: String },

    /// Unrecognised or impossible due expression
    #[error("Invalid date '{token}': expected today, tomorrow, +N, eow, eom, Nm, yyyymmdd or mmdd")]
    InvalidDate { token: String },

    /// Status value outside the domain's status set
    #[error("Invalid status '{token}' for {domain}; valid: {}", .valid.join(", "))]
    InvalidStatus {
        token: String,
        domain: Domain,
        valid: Vec<String>,
    },

    /// `@` with no project name
    #[error("Invalid project reference '{token}': expected @name or @\"name with spaces\"")]
    InvalidProject { token: String },

    /// Directive key that is not one of the eight known keys
    #[error("Unknown directive '{name}' in '{token}'; valid: {}", .valid.join(", "))]
    UnknownDirective {
        token: String,
        name: String,
        valid: Vec<String>,
    },

    /// Column or sort field unknown to every domain
    #[error("Invalid column '{column}' for {domain}; valid: {}", .valid.join(", "))]
    InvalidColumn {
        column: String,
        domain: Domain,
        valid: Vec<String>,
    },

    /// Metric unknown to every domain
    #[error("Invalid metric '{metric}' for {domain}; valid: {}", .valid.join(", "))]
    InvalidMetric {
        metric: String,
        domain: Domain,
        valid: Vec<String>,
    },

    /// `with:` relation unknown to every domain
    #[error("Invalid relation '{relation}' for {domain}; valid: {}", .valid.join(", "))]
    InvalidRelation {
        relation: String,
        domain: Domain,
        valid: Vec<String>,
    },

    /// `group:` field that cannot be grouped on
    #[error("Cannot group {domain} by '{field}'; valid: {}", .valid.join(", "))]
    InvalidGroup {
        field: String,
        domain: Domain,
        valid: Vec<String>,
    },

    /// `view:` value other than list or kanban
    #[error("Invalid view '{value}'; valid: {}", .valid.join(", "))]
    InvalidView { value: String, valid: Vec<String> },

    /// A single-valued directive given more than once
    #[error("Directive '{name}' may only appear once")]
    DuplicateDirective { name: String },

    /// A single-valued directive given a list
    #[error("Directive '{name}' takes exactly one value, got '{token}'")]
    InvalidDirectiveValue { name: String, token: String },

    /// No domain word and no `load:`
    #[error("Query must start with a domain; valid: {}", .valid.join(", "))]
    MissingDomain { valid: Vec<String> },

    /// Leading word is not a domain keyword
    #[error("Unknown domain '{word}'; valid: {}", .valid.join(", "))]
    UnknownDomain { word: String, valid: Vec<String> },

    /// A saved query that itself loads another saved query
    #[error("Saved query '{name}' contains a load: directive")]
    NestedLoad { name: String },
}

/// Errors raised while resolving `load:<name>`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Saved query '{name}' not found")]
    NotFound { name: String, available: Vec<String> },
}

/// A token valid for one domain used in a query against another
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{token}' is not valid for {domain}; it applies to: {}", display_domains(.valid_in))]
pub struct DomainMismatchError {
    pub token: String,
    pub domain: Domain,
    pub valid_in: Vec<Domain>,
}

fn display_domains(domains: &[Domain]) -> String {
    domains
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Domain mismatch: {0}")]
    DomainMismatch(#[from] DomainMismatchError),

    /// Saved query store failed to persist
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Stable classification, e.g. `compile.invalid_column`
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Lex(LexError::UnterminatedQuote { .. }) => "lex.unterminated_quote",
            QueryError::Lex(LexError::MalformedDirective { .. }) => "lex.malformed_directive",
            QueryError::Compile(e) => match e {
                CompileError::InvalidPriority { .. } => "compile.invalid_priority",
                CompileError::InvalidDate { .. } => "compile.invalid_date",
                CompileError::InvalidStatus { .. } => "compile.invalid_status",
                CompileError::InvalidProject { .. } => "compile.invalid_project",
                CompileError::UnknownDirective { .. } => "compile.unknown_directive",
                CompileError::InvalidColumn { .. } => "compile.invalid_column",
                CompileError::InvalidMetric { .. } => "compile.invalid_metric",
                CompileError::InvalidRelation { .. } => "compile.invalid_relation",
                CompileError::InvalidGroup { .. } => "compile.invalid_group",
                CompileError::InvalidView { .. } => "compile.invalid_view",
                CompileError::DuplicateDirective { .. } => "compile.duplicate_directive",
                CompileError::InvalidDirectiveValue { .. } => "compile.invalid_directive_value",
                CompileError::MissingDomain { .. } => "compile.missing_domain",
                CompileError::UnknownDomain { .. } => "compile.unknown_domain",
                CompileError::NestedLoad { .. } => "compile.nested_load",
            },
            QueryError::Load(LoadError::NotFound { .. }) => "load.not_found",
            QueryError::DomainMismatch(_) => "domain_mismatch",
            QueryError::Store(_) => "store",
        }
    }

    /// Valid options to show alongside the error, if the failure has any
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            QueryError::Compile(e) => match e {
                CompileError::InvalidStatus { valid, .. }
                | CompileError::UnknownDirective { valid, .. }
                | CompileError::InvalidColumn { valid, .. }
                | CompileError::InvalidMetric { valid, .. }
                | CompileError::InvalidRelation { valid, .. }
                | CompileError::InvalidGroup { valid, .. }
                | CompileError::InvalidView { valid, .. }
                | CompileError::MissingDomain { valid }
                | CompileError::UnknownDomain { valid, .. } => valid.clone(),
                _ => Vec::new(),
            },
            QueryError::Load(LoadError::NotFound { available, .. }) => available.clone(),
            QueryError::DomainMismatch(e) => e.valid_in.iter().map(|d| d.to_string()).collect(),
            QueryError::Lex(_) | QueryError::Store(_) => Vec::new(),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
