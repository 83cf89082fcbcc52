//! Domain Schemas
//!
//! Static field, metric, relation and column tables for each domain.
//! Every name a query mentions is validated by lookup in these tables, and
//! the same tables feed the "valid options" lists in error messages.

use crate::records::Domain;
use serde::Serialize;

/// Filter families a domain may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Project,
    Priority,
    Due,
    Status,
    Tag,
    Text,
}

/// Static description of one domain
#[derive(Debug)]
pub struct DomainSchema {
    pub domain: Domain,
    /// Stored record fields
    pub fields: &'static [&'static str],
    /// Computed metrics
    pub metrics: &'static [&'static str],
    /// `with:` relation handles
    pub relations: &'static [&'static str],
    /// Columns shown when `cols:` is omitted
    pub default_columns: &'static [&'static str],
    /// Fields accepted by `group:`
    pub groupable: &'static [&'static str],
    /// Values accepted by `status:`
    pub statuses: &'static [&'static str],
    /// Filter families accepted by this domain
    pub filters: &'static [FilterKind],
}

pub const TASK_SCHEMA: DomainSchema = DomainSchema {
    domain: Domain::Task,
    fields: &["id", "text", "project", "priority", "due", "status", "tags"],
    metrics: &["time_today", "time_week", "time_month", "overdue_days"],
    relations: &["project", "time"],
    default_columns: &["id", "text", "project", "priority", "due", "status"],
    groupable: &["project", "priority", "due", "status"],
    statuses: &["pending", "done"],
    filters: &[
        FilterKind::Project,
        FilterKind::Priority,
        FilterKind::Due,
        FilterKind::Status,
        FilterKind::Tag,
        FilterKind::Text,
    ],
};

pub const PROJECT_SCHEMA: DomainSchema = DomainSchema {
    domain: Domain::Project,
    fields: &["name", "description", "status"],
    metrics: &["task_count", "overdue_task_count", "time_week", "time_month"],
    relations: &["tasks", "time"],
    default_columns: &["name", "status", "description"],
    groupable: &["status"],
    statuses: &["active", "archived"],
    filters: &[FilterKind::Project, FilterKind::Status, FilterKind::Text],
};

pub const TIMELOG_SCHEMA: DomainSchema = DomainSchema {
    domain: Domain::TimeLog,
    fields: &["id", "project", "task_id", "date", "minutes", "note"],
    metrics: &[],
    relations: &["project", "tasks"],
    default_columns: &["id", "date", "project", "task_id", "minutes", "note"],
    groupable: &["project", "task_id", "date"],
    statuses: &[],
    filters: &[FilterKind::Project, FilterKind::Text],
};

/// Look up the schema for a domain
pub fn schema(domain: Domain) -> &'static DomainSchema {
    match domain {
        Domain::Task => &TASK_SCHEMA,
        Domain::Project => &PROJECT_SCHEMA,
        Domain::TimeLog => &TIMELOG_SCHEMA,
    }
}

/// Domains whose schema satisfies `pred`, in declaration order
pub fn domains_where(pred: impl Fn(&DomainSchema) -> bool) -> Vec<Domain> {
    Domain::all()
        .iter()
        .copied()
        .filter(|d| pred(schema(*d)))
        .collect()
}

impl DomainSchema {
    pub fn is_field(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }

    pub fn is_metric(&self, name: &str) -> bool {
        self.metrics.contains(&name)
    }

    pub fn is_relation(&self, name: &str) -> bool {
        self.relations.contains(&name)
    }

    /// Fields, metrics and relation handles
    pub fn is_column(&self, name: &str) -> bool {
        self.is_field(name) || self.is_metric(name) || self.is_relation(name)
    }

    /// Fields and metrics
    pub fn is_sortable(&self, name: &str) -> bool {
        self.is_field(name) || self.is_metric(name)
    }

    pub fn allows(&self, kind: FilterKind) -> bool {
        self.filters.contains(&kind)
    }

    /// Every valid column name, without duplicates, in table order
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for name in self.fields.iter().chain(self.metrics).chain(self.relations) {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
        columns
    }

    /// Every valid sort field
    pub fn sortable(&self) -> Vec<String> {
        self.fields
            .iter()
            .chain(self.metrics)
            .map(|s| s.to_string())
            .collect()
    }
}

/// Convert a static name table into owned strings for error reporting
pub fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
