//! Query Executor
//!
//! Evaluates a [`CompiledQuery`] against a read-only [`RecordSource`]:
//!
//! # Execution Pipeline
//!
//! ```text
//! records → Filter → Relate → Compute → Project → Sort → Group → QueryOutput
//! ```
//!
//! Every stage is a function over the row sequence; none of them touch the
//! source records, which are only borrowed for the lifetime of the output.

use crate::query::ast::*;
use crate::query::dates::EvalContext;
use crate::query::error::{CompileError, QueryResult};
use crate::query::metrics::{MetricEngine, RelationIndex};
use crate::query::schema::{schema, to_strings, DomainSchema};
use crate::records::{Domain, Priority, Project, RecordRef, RecordSource, Task, TimeLog};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Group key for rows with no value in the grouped field
pub const NO_GROUP: &str = "none";

/// A single projected or computed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Priority(Priority),
    Tags(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn text(s: &str) -> Self {
        Value::Text(s.to_string())
    }

    fn opt_text(s: Option<&String>) -> Self {
        s.map(|s| Value::Text(s.clone())).unwrap_or(Value::Null)
    }

    /// Compare two non-null values of the same kind
    fn cmp_present(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Priority(a), Value::Priority(b)) => a.cmp(b),
            (Value::Tags(a), Value::Tags(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    /// Order by `direction`, with nulls after every present value either way
    pub fn cmp_directed(&self, other: &Self, direction: SortDirection) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match direction {
                SortDirection::Asc => self.cmp_present(other),
                SortDirection::Desc => self.cmp_present(other).reverse(),
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Priority(p) => write!(f, "{}", p),
            Value::Tags(tags) => write!(f, "{}", tags.join(",")),
        }
    }
}

/// Stored field value of a record
pub fn field_value(record: RecordRef<'_>, field: &str) -> Value {
    match record {
        RecordRef::Task(task) => task_field(task, field),
        RecordRef::Project(project) => project_field(project, field),
        RecordRef::TimeLog(log) => time_log_field(log, field),
    }
}

fn task_field(task: &Task, field: &str) -> Value {
    match field {
        "id" => Value::Int(task.id as i64),
        "text" => Value::text(&task.text),
        "project" => Value::text(&task.project),
        "priority" => Value::Priority(task.priority),
        "due" => task.due.map(Value::Date).unwrap_or(Value::Null),
        "status" => Value::text(task.status.as_str()),
        "tags" => Value::Tags(task.tags.iter().cloned().collect()),
        _ => Value::Null,
    }
}

fn project_field(project: &Project, field: &str) -> Value {
    match field {
        "name" => Value::text(&project.name),
        "description" => Value::opt_text(project.description.as_ref()),
        "status" => Value::text(project.status.as_str()),
        _ => Value::Null,
    }
}

fn time_log_field(log: &TimeLog, field: &str) -> Value {
    match field {
        "id" => Value::Int(log.id as i64),
        "project" => Value::text(&log.project),
        "task_id" => log.task_id.map(|id| Value::Int(id as i64)).unwrap_or(Value::Null),
        "date" => Value::Date(log.date),
        "minutes" => Value::Int(log.minutes as i64),
        "note" => Value::opt_text(log.note.as_ref()),
        _ => Value::Null,
    }
}

/// One record flowing through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow<'a> {
    pub record: RecordRef<'a>,
    pub computed_metrics: BTreeMap<String, Value>,
    pub related: BTreeMap<String, Vec<RecordRef<'a>>>,
    /// Projected values, in output column order
    pub cells: Vec<Value>,
}

impl<'a> ResultRow<'a> {
    pub fn new(record: RecordRef<'a>) -> Self {
        Self {
            record,
            computed_metrics: BTreeMap::new(),
            related: BTreeMap::new(),
            cells: Vec::new(),
        }
    }

    /// Resolve a column: stored field, then metric, then relation count
    pub fn value(&self, name: &str) -> Value {
        let schema = schema(self.record.domain());
        if schema.is_field(name) {
            field_value(self.record, name)
        } else if let Some(value) = self.computed_metrics.get(name) {
            value.clone()
        } else if let Some(related) = self.related.get(name) {
            Value::Int(related.len() as i64)
        } else {
            Value::Null
        }
    }
}

/// Rows sharing one value of the grouped field
#[derive(Debug, Clone, Serialize)]
pub struct ResultGroup<'a> {
    pub key: String,
    pub rows: Vec<ResultRow<'a>>,
}

/// Everything handed to the renderer
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput<'a> {
    pub domain: Domain,
    pub columns: Vec<String>,
    pub view: View,
    pub rows: Vec<ResultRow<'a>>,
    /// Present only with `group:`, buckets in order of first appearance
    pub groups: Option<Vec<ResultGroup<'a>>>,
}

impl QueryOutput<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Whether a record satisfies one clause
pub fn matches_clause(record: RecordRef<'_>, clause: &FilterClause, ctx: &EvalContext) -> bool {
    match record {
        RecordRef::Task(task) => task_matches(task, clause, ctx),
        RecordRef::Project(project) => project_matches(project, clause),
        RecordRef::TimeLog(log) => time_log_matches(log, clause),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn task_matches(task: &Task, clause: &FilterClause, ctx: &EvalContext) -> bool {
    match clause {
        FilterClause::ProjectEquals { project } => task.project.eq_ignore_ascii_case(project),
        FilterClause::PriorityCompare { op, value } => op.compare(task.priority.level(), *value),
        FilterClause::PriorityRange { lo, hi } => (*lo..=*hi).contains(&task.priority.level()),
        FilterClause::DueRelative { due } => task.due.map(|d| due.matches(d, ctx)).unwrap_or(false),
        FilterClause::Overdue => task.is_overdue(ctx.today),
        FilterClause::StatusEquals { status } => task.status.as_str() == status,
        FilterClause::TagPresent { tag, negated } => task.has_tag(tag) != *negated,
        FilterClause::TextContains { term } => contains_ci(&task.text, term),
    }
}

fn project_matches(project: &Project, clause: &FilterClause) -> bool {
    match clause {
        FilterClause::ProjectEquals { project: name } => project.name.eq_ignore_ascii_case(name),
        FilterClause::StatusEquals { status } => project.status.as_str() == status,
        FilterClause::TextContains { term } => {
            contains_ci(&project.name, term)
                || project
                    .description
                    .as_deref()
                    .map(|d| contains_ci(d, term))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn time_log_matches(log: &TimeLog, clause: &FilterClause) -> bool {
    match clause {
        FilterClause::ProjectEquals { project } => log.project.eq_ignore_ascii_case(project),
        FilterClause::TextContains { term } => {
            log.note.as_deref().map(|n| contains_ci(n, term)).unwrap_or(false)
        }
        _ => false,
    }
}

fn records(source: &RecordSource, domain: Domain) -> Vec<RecordRef<'_>> {
    match domain {
        Domain::Task => source.tasks().iter().map(RecordRef::Task).collect(),
        Domain::Project => source.projects().iter().map(RecordRef::Project).collect(),
        Domain::TimeLog => source.timelogs().iter().map(RecordRef::TimeLog).collect(),
    }
}

/// Query evaluator over one record source
pub struct QueryExecutor<'a> {
    source: &'a RecordSource,
    index: RelationIndex<'a>,
}

impl<'a> QueryExecutor<'a> {
    /// Create an executor, indexing the source for joins
    pub fn new(source: &'a RecordSource) -> Self {
        Self {
            source,
            index: RelationIndex::build(source),
        }
    }

    /// Run every pipeline stage and assemble the output
    pub fn execute(&self, query: &CompiledQuery, ctx: &EvalContext) -> QueryResult<QueryOutput<'a>> {
        let schema = schema(query.domain);
        let directives = &query.directives;

        let rows = self.filter(query, ctx);
        debug!(domain = %query.domain, rows = rows.len(), "Filter stage complete");

        let rows = self.relate(rows, directives);
        let rows = self.compute(rows, schema, directives, ctx)?;

        let columns = project_columns(schema, directives)?;
        let rows = project(rows, &columns);

        let rows = sort_rows(rows, &directives.sort);
        let groups = directives.group.as_deref().map(|field| group_rows(&rows, field));
        debug!(
            rows = rows.len(),
            groups = groups.as_ref().map(Vec::len).unwrap_or(0),
            "Query evaluated"
        );

        Ok(QueryOutput {
            domain: query.domain,
            columns,
            view: directives.view.unwrap_or_default(),
            rows,
            groups,
        })
    }

    /// Keep records satisfying every clause
    fn filter(&self, query: &CompiledQuery, ctx: &EvalContext) -> Vec<ResultRow<'a>> {
        records(self.source, query.domain)
            .into_iter()
            .filter(|r| query.filters.iter().all(|c| matches_clause(*r, c, ctx)))
            .map(ResultRow::new)
            .collect()
    }

    /// Attach `with:` relations
    fn relate(&self, mut rows: Vec<ResultRow<'a>>, directives: &QueryDirectives) -> Vec<ResultRow<'a>> {
        if directives.with.is_empty() {
            return rows;
        }
        for row in &mut rows {
            for relation in &directives.with {
                let related = self.index.related(row.record, relation);
                row.related.insert(relation.clone(), related);
            }
        }
        rows
    }

    /// Populate requested metrics
    fn compute(
        &self,
        mut rows: Vec<ResultRow<'a>>,
        schema: &DomainSchema,
        directives: &QueryDirectives,
        ctx: &EvalContext,
    ) -> QueryResult<Vec<ResultRow<'a>>> {
        if let Some(metric) = directives.metrics.iter().find(|m| !schema.is_metric(m)) {
            return Err(CompileError::InvalidMetric {
                metric: metric.clone(),
                domain: schema.domain,
                valid: to_strings(schema.metrics),
            }
            .into());
        }
        if directives.metrics.is_empty() {
            return Ok(rows);
        }

        let engine = MetricEngine::new(&self.index, *ctx);
        for row in &mut rows {
            for metric in &directives.metrics {
                let value = engine
                    .compute(row.record, metric)
                    .map(Value::Int)
                    .unwrap_or(Value::Null);
                row.computed_metrics.insert(metric.clone(), value);
            }
        }
        Ok(rows)
    }
}

/// Evaluate a compiled query in one call
pub fn evaluate<'a>(
    query: &CompiledQuery,
    source: &'a RecordSource,
    ctx: &EvalContext,
) -> QueryResult<QueryOutput<'a>> {
    QueryExecutor::new(source).execute(query, ctx)
}

/// Output columns: explicit `cols:` or the domain default
fn project_columns(schema: &DomainSchema, directives: &QueryDirectives) -> QueryResult<Vec<String>> {
    let Some(columns) = &directives.columns else {
        return Ok(to_strings(schema.default_columns));
    };
    if let Some(column) = columns.iter().find(|c| !schema.is_column(c)) {
        return Err(CompileError::InvalidColumn {
            column: column.clone(),
            domain: schema.domain,
            valid: schema.columns(),
        }
        .into());
    }
    if columns.is_empty() {
        return Ok(to_strings(schema.default_columns));
    }
    Ok(columns.clone())
}

fn project<'a>(mut rows: Vec<ResultRow<'a>>, columns: &[String]) -> Vec<ResultRow<'a>> {
    for row in &mut rows {
        row.cells = columns.iter().map(|c| row.value(c)).collect();
    }
    rows
}

/// Stable multi-key sort
fn sort_rows<'a>(rows: Vec<ResultRow<'a>>, keys: &[SortKey]) -> Vec<ResultRow<'a>> {
    if keys.is_empty() {
        return rows;
    }

    let mut decorated: Vec<(Vec<Value>, ResultRow<'a>)> = rows
        .into_iter()
        .map(|row| (keys.iter().map(|k| row.value(&k.field)).collect(), row))
        .collect();

    decorated.sort_by(|(a, _), (b, _)| {
        keys.iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(key, (x, y))| x.cmp_directed(y, key.direction))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    decorated.into_iter().map(|(_, row)| row).collect()
}

/// Partition sorted rows into buckets without reordering them
fn group_rows<'a>(rows: &[ResultRow<'a>], field: &str) -> Vec<ResultGroup<'a>> {
    let mut groups: Vec<ResultGroup<'a>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let value = row.value(field);
        let key = if value.is_null() {
            NO_GROUP.to_string()
        } else {
            value.to_string()
        };

        let idx = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(ResultGroup {
                key,
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].rows.push(row.clone());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::error::QueryError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> EvalContext {
        EvalContext::new(date(2024, 1, 17))
    }

    fn source() -> RecordSource {
        RecordSource::new(
            vec![
                Task::new(1, "Fix login", "webapp").priority(1).due(date(2024, 1, 17)).tag("urgent"),
                Task::new(2, "Write docs", "webapp").priority(2).due(date(2024, 1, 27)),
                Task::new(3, "Release notes", "webapp").priority(1).done().tag("blocked"),
                Task::new(4, "Buy milk", "home").priority(3).due(date(2024, 1, 10)).tag("Blocked"),
                Task::new(5, "fix sink", "home").priority(2),
            ],
            vec![
                Project::new("webapp").description("Customer portal"),
                Project::new("home").archived(),
            ],
            vec![
                TimeLog::new(1, "webapp", date(2024, 1, 16), 30).task(1).note("login flow"),
                TimeLog::new(2, "webapp", date(2024, 1, 17), 20).task(1),
                TimeLog::new(3, "home", date(2024, 1, 15), 10),
            ],
        )
    }

    fn ids(output: &QueryOutput<'_>) -> Vec<i64> {
        output
            .rows
            .iter()
            .map(|r| match r.value("id") {
                Value::Int(id) => id,
                other => panic!("unexpected id {:?}", other),
            })
            .collect()
    }

    fn run<'a>(query: &CompiledQuery, source: &'a RecordSource) -> QueryOutput<'a> {
        evaluate(query, source, &ctx()).unwrap()
    }

    #[test]
    fn test_filters_combine_with_and() {
        let source = source();
        let query = CompiledQuery::new(Domain::Task)
            .filter(FilterClause::ProjectEquals { project: "WebApp".into() })
            .filter(FilterClause::PriorityCompare { op: ComparisonOp::Eq, value: 1 });
        assert_eq!(ids(&run(&query, &source)), vec![1, 3]);
    }

    #[test]
    fn test_text_search_case_insensitive() {
        let source = source();
        let query = CompiledQuery::new(Domain::Task)
            .filter(FilterClause::TextContains { term: "FIX".into() });
        assert_eq!(ids(&run(&query, &source)), vec![1, 5]);

        let query = CompiledQuery::new(Domain::Project)
            .filter(FilterClause::TextContains { term: "portal".into() });
        assert_eq!(run(&query, &source).len(), 1);

        let query = CompiledQuery::new(Domain::TimeLog)
            .filter(FilterClause::TextContains { term: "login".into() });
        assert_eq!(ids(&run(&query, &source)), vec![1]);
    }

    #[test]
    fn test_negation_excludes_exactly_the_tagged_rows() {
        let source = source();
        let base = CompiledQuery::new(Domain::Task);
        let all = ids(&run(&base, &source));
        let tagged = ids(&run(
            &base.clone().filter(FilterClause::TagPresent { tag: "blocked".into(), negated: false }),
            &source,
        ));
        let untagged = ids(&run(
            &base.filter(FilterClause::TagPresent { tag: "blocked".into(), negated: true }),
            &source,
        ));

        assert_eq!(tagged, vec![3, 4]);
        let mut union: Vec<i64> = tagged.iter().chain(untagged.iter()).copied().collect();
        union.sort();
        assert_eq!(union, all);
        assert!(untagged.iter().all(|id| !tagged.contains(id)));
    }

    #[test]
    fn test_priority_range_is_union_of_levels() {
        let source = source();
        let range = ids(&run(
            &CompiledQuery::new(Domain::Task).filter(FilterClause::PriorityRange { lo: 1, hi: 3 }),
            &source,
        ));

        let mut union = Vec::new();
        for level in 1..=3 {
            union.extend(ids(&run(
                &CompiledQuery::new(Domain::Task)
                    .filter(FilterClause::PriorityCompare { op: ComparisonOp::Eq, value: level }),
                &source,
            )));
        }
        union.sort();
        assert_eq!(range, union);
    }

    #[test]
    fn test_due_and_overdue() {
        let source = source();
        let query = CompiledQuery::new(Domain::Task)
            .filter(FilterClause::DueRelative { due: DueKind::WithinDays { days: 7 } });
        assert_eq!(ids(&run(&query, &source)), vec![1]);

        let query = CompiledQuery::new(Domain::Task).filter(FilterClause::Overdue);
        assert_eq!(ids(&run(&query, &source)), vec![4]);
    }

    #[test]
    fn test_sort_is_stable_with_nulls_last() {
        let source = source();
        let query = CompiledQuery::new(Domain::Task).sort(SortKey::asc("due"));
        assert_eq!(ids(&run(&query, &source)), vec![4, 1, 2, 3, 5]);

        let query = CompiledQuery::new(Domain::Task).sort(SortKey::desc("due"));
        assert_eq!(ids(&run(&query, &source)), vec![2, 1, 4, 3, 5]);

        // equal priorities keep their input order
        let query = CompiledQuery::new(Domain::Task).sort(SortKey::desc("priority"));
        assert_eq!(ids(&run(&query, &source)), vec![1, 3, 2, 5, 4]);
    }

    #[test]
    fn test_sort_chain_and_text_case() {
        let source = source();
        let query = CompiledQuery::new(Domain::Task)
            .sort(SortKey::asc("project"))
            .sort(SortKey::asc("text"));
        assert_eq!(ids(&run(&query, &source)), vec![4, 5, 1, 3, 2]);
    }

    #[test]
    fn test_default_columns_and_cells() {
        let source = source();
        let output = run(&CompiledQuery::new(Domain::Task), &source);
        assert_eq!(output.columns, vec!["id", "text", "project", "priority", "due", "status"]);
        assert_eq!(output.view, View::List);
        assert!(output.groups.is_none());
        assert_eq!(output.rows[0].cells[0], Value::Int(1));
        assert_eq!(output.rows[2].cells[4], Value::Null);
    }

    #[test]
    fn test_metrics_and_relations_projected() {
        let source = source();
        let mut query = CompiledQuery::new(Domain::Task)
            .filter(FilterClause::ProjectEquals { project: "webapp".into() });
        query.directives.columns = Some(vec!["id".into(), "time_week".into(), "time".into()]);
        query.directives.metrics.insert("time_week".into());
        query.directives.with.insert("time".into());

        let output = run(&query, &source);
        let first = &output.rows[0];
        assert_eq!(first.cells, vec![Value::Int(1), Value::Int(50), Value::Int(2)]);
        assert_eq!(first.computed_metrics.get("time_week"), Some(&Value::Int(50)));
        assert_eq!(first.related["time"].len(), 2);
        assert_eq!(output.rows[1].cells, vec![Value::Int(2), Value::Int(0), Value::Int(0)]);
    }

    #[test]
    fn test_group_preserves_sorted_order() {
        let source = source();
        let mut query = CompiledQuery::new(Domain::Task).sort(SortKey::asc("due"));
        query.directives.group = Some("project".into());

        let output = run(&query, &source);
        let groups = output.groups.unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["home", "webapp"]);
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[0].rows[0].value("id"), Value::Int(4));
        assert_eq!(groups[1].rows.len(), 3);
    }

    #[test]
    fn test_group_null_bucket() {
        let source = source();
        let mut query = CompiledQuery::new(Domain::Task);
        query.directives.group = Some("due".into());
        let groups = run(&query, &source).groups.unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[2].key, NO_GROUP);
        assert_eq!(groups[2].rows.len(), 2);
    }

    #[test]
    fn test_invalid_columns_rejected_at_projection() {
        let source = source();
        let mut query = CompiledQuery::new(Domain::Project);
        query.directives.columns = Some(vec!["name".into(), "minutes".into()]);
        let err = evaluate(&query, &source, &ctx()).unwrap_err();
        assert!(matches!(err, QueryError::Compile(CompileError::InvalidColumn { .. })));
    }

    #[test]
    fn test_source_untouched() {
        let source = source();
        let before = source.clone();
        let mut query = CompiledQuery::new(Domain::Project).sort(SortKey::desc("name"));
        query.directives.metrics.insert("task_count".into());
        let output = run(&query, &source);
        assert_eq!(output.rows[0].computed_metrics["task_count"], Value::Int(3));
        assert_eq!(source, before);
    }
}
