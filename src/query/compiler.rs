//! Query Compiler
//!
//! Turns a token sequence into a [`CompiledQuery`]: filter tokens become
//! [`FilterClause`]s and directive tokens fill [`QueryDirectives`]. Every
//! name is checked against the domain's static tables; a name that belongs
//! to another domain is reported as a [`DomainMismatchError`] rather than an
//! unknown name.
//!
//! A query containing `load:<name>` compiles to [`Compilation::Load`]: the
//! saved text replaces the whole invocation, so nothing else is compiled.

use crate::query::ast::*;
use crate::query::dates::parse_due;
use crate::query::error::{CompileError, DomainMismatchError, QueryError, QueryResult};
use crate::query::lexer::{Token, TokenKind};
use crate::query::schema::{domains_where, schema, to_strings, DomainSchema, FilterKind};
use crate::records::{Domain, Priority};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{all_consuming, map_opt, opt},
    sequence::{pair, separated_pair},
    IResult,
};

/// The eight directive keys
pub const DIRECTIVES: &[&str] = &["cols", "sort", "metrics", "with", "group", "view", "save", "load"];

/// Result of compiling one token sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compilation {
    /// A self-contained query
    Ready(CompiledQuery),
    /// `load:<name>`; `discarded` holds the raw text of every other token
    Load { name: String, discarded: Vec<String> },
}

/// Compile a lexed token sequence
pub fn compile(tokens: &[Token]) -> QueryResult<Compilation> {
    if let Some(name) = find_load(tokens)? {
        let discarded = tokens
            .iter()
            .filter(|t| !is_directive(t, "load"))
            .map(|t| t.raw.clone())
            .collect();
        return Ok(Compilation::Load { name, discarded });
    }

    let (first, rest) = tokens.split_first().ok_or_else(missing_domain)?;
    let domain = match &first.kind {
        TokenKind::Domain { domain } => *domain,
        TokenKind::TextTerm { .. } => {
            return Err(CompileError::UnknownDomain {
                word: first.raw.clone(),
                valid: to_strings(Domain::keywords()),
            }
            .into())
        }
        _ => return Err(missing_domain().into()),
    };

    let mut compiler = Compiler::new(domain);
    for token in rest {
        compiler.token(token)?;
    }

    Ok(Compilation::Ready(compiler.finish()))
}

fn missing_domain() -> CompileError {
    CompileError::MissingDomain {
        valid: to_strings(Domain::keywords()),
    }
}

fn is_directive(token: &Token, key: &str) -> bool {
    matches!(&token.kind, TokenKind::Directive { name, .. } if name == key)
}

/// Locate the single `load:` directive, if any
fn find_load(tokens: &[Token]) -> QueryResult<Option<String>> {
    let mut loads = tokens.iter().filter(|t| is_directive(t, "load"));
    let Some(token) = loads.next() else {
        return Ok(None);
    };
    if loads.next().is_some() {
        return Err(CompileError::DuplicateDirective {
            name: "load".to_string(),
        }
        .into());
    }
    single_value("load", token).map(Some)
}

fn single_value(name: &str, token: &Token) -> QueryResult<String> {
    match &token.kind {
        TokenKind::Directive { values, .. } if values.len() == 1 => Ok(values[0].clone()),
        _ => Err(CompileError::InvalidDirectiveValue {
            name: name.to_string(),
            token: token.raw.clone(),
        }
        .into()),
    }
}

/// Parse the text after `p` into a priority clause
pub fn parse_priority(expr: &str) -> Option<FilterClause> {
    all_consuming(alt((priority_range, priority_compare)))(expr)
        .ok()
        .map(|(_, clause)| clause)
}

fn priority_level(s: &str) -> Option<u8> {
    s.parse::<u8>().ok().and_then(Priority::new).map(|p| p.level())
}

/// `A..B`
fn priority_range(input: &str) -> IResult<&str, FilterClause> {
    map_opt(separated_pair(digit1, tag(".."), digit1), |(a, b)| {
        let lo = priority_level(a)?;
        let hi = priority_level(b)?;
        (lo <= hi).then_some(FilterClause::PriorityRange { lo, hi })
    })(input)
}

/// `N`, `<=N`, `>=N`, `<N`, `>N`, `=N`
fn priority_compare(input: &str) -> IResult<&str, FilterClause> {
    let op = alt((tag("<="), tag(">="), tag("<"), tag(">"), tag("=")));
    map_opt(pair(opt(op), digit1), |(op, n): (Option<&str>, &str)| {
        Some(FilterClause::PriorityCompare {
            op: ComparisonOp::from_str(op.unwrap_or(""))?,
            value: priority_level(n)?,
        })
    })(input)
}

/// Accumulates clauses and directives for one domain
struct Compiler {
    domain: Domain,
    schema: &'static DomainSchema,
    filters: Vec<FilterClause>,
    directives: QueryDirectives,
}

impl Compiler {
    fn new(domain: Domain) -> Self {
        Self {
            domain,
            schema: schema(domain),
            filters: Vec::new(),
            directives: QueryDirectives::default(),
        }
    }

    fn finish(self) -> CompiledQuery {
        CompiledQuery {
            domain: self.domain,
            filters: self.filters,
            directives: self.directives,
        }
    }

    fn token(&mut self, token: &Token) -> QueryResult<()> {
        let clause = match &token.kind {
            TokenKind::Directive { name, values } => return self.directive(token, name, values),
            TokenKind::TextTerm { term } => {
                self.require(FilterKind::Text, token)?;
                FilterClause::TextContains { term: term.clone() }
            }
            // Only the leading word is classified as a domain
            TokenKind::Domain { .. } => {
                self.require(FilterKind::Text, token)?;
                FilterClause::TextContains {
                    term: token.raw.clone(),
                }
            }
            TokenKind::ProjectRef { name } => {
                self.require(FilterKind::Project, token)?;
                if name.is_empty() {
                    return Err(CompileError::InvalidProject {
                        token: token.raw.clone(),
                    }
                    .into());
                }
                FilterClause::ProjectEquals {
                    project: name.clone(),
                }
            }
            TokenKind::PriorityExpr { expr } => {
                self.require(FilterKind::Priority, token)?;
                parse_priority(expr).ok_or_else(|| CompileError::InvalidPriority {
                    token: token.raw.clone(),
                })?
            }
            TokenKind::DateExpr { expr } => {
                self.require(FilterKind::Due, token)?;
                let due = parse_due(expr).ok_or_else(|| CompileError::InvalidDate {
                    token: token.raw.clone(),
                })?;
                FilterClause::DueRelative { due }
            }
            TokenKind::Overdue => {
                self.require(FilterKind::Due, token)?;
                FilterClause::Overdue
            }
            TokenKind::StatusExpr { value } => {
                self.require(FilterKind::Status, token)?;
                if !self.schema.statuses.contains(&value.as_str()) {
                    return Err(CompileError::InvalidStatus {
                        token: token.raw.clone(),
                        domain: self.domain,
                        valid: to_strings(self.schema.statuses),
                    }
                    .into());
                }
                FilterClause::StatusEquals {
                    status: value.clone(),
                }
            }
            TokenKind::TagExpr { tag, negated } => {
                self.require(FilterKind::Tag, token)?;
                FilterClause::TagPresent {
                    tag: tag.clone(),
                    negated: *negated,
                }
            }
        };

        self.filters.push(clause);
        Ok(())
    }

    /// Reject a filter family this domain does not support
    fn require(&self, kind: FilterKind, token: &Token) -> QueryResult<()> {
        if self.schema.allows(kind) {
            return Ok(());
        }
        Err(DomainMismatchError {
            token: token.raw.clone(),
            domain: self.domain,
            valid_in: domains_where(|s| s.allows(kind)),
        }
        .into())
    }

    /// A `DomainMismatchError` if another domain accepts `name`, else `fallback`
    fn unknown_name(
        &self,
        name: &str,
        pred: impl Fn(&DomainSchema) -> bool,
        fallback: CompileError,
    ) -> QueryError {
        let valid_in = domains_where(|s| s.domain != self.domain && pred(s));
        if valid_in.is_empty() {
            fallback.into()
        } else {
            DomainMismatchError {
                token: name.to_string(),
                domain: self.domain,
                valid_in,
            }
            .into()
        }
    }

    /// Mark a single-valued directive as seen and return its value
    fn once(&self, name: &str, already_set: bool, token: &Token) -> QueryResult<String> {
        if already_set {
            return Err(CompileError::DuplicateDirective {
                name: name.to_string(),
            }
            .into());
        }
        single_value(name, token)
    }

    fn directive(&mut self, token: &Token, name: &str, values: &[String]) -> QueryResult<()> {
        match name {
            "cols" => {
                let mut columns = self.directives.columns.take().unwrap_or_default();
                for value in values {
                    let column = value.to_lowercase();
                    if !self.schema.is_column(&column) {
                        return Err(self.unknown_name(
                            &column,
                            |s| s.is_column(&column),
                            CompileError::InvalidColumn {
                                column: column.clone(),
                                domain: self.domain,
                                valid: self.schema.columns(),
                            },
                        ));
                    }
                    self.imply(&column);
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                self.directives.columns = Some(columns);
            }
            "sort" => {
                for value in values {
                    let key = self.sort_key(value)?;
                    self.imply(&key.field);
                    self.directives.sort.push(key);
                }
            }
            "metrics" => {
                for value in values {
                    let metric = value.to_lowercase();
                    if !self.schema.is_metric(&metric) {
                        return Err(self.unknown_name(
                            &metric,
                            |s| s.is_metric(&metric),
                            CompileError::InvalidMetric {
                                metric: metric.clone(),
                                domain: self.domain,
                                valid: to_strings(self.schema.metrics),
                            },
                        ));
                    }
                    self.directives.metrics.insert(metric);
                }
            }
            "with" => {
                for value in values {
                    let relation = value.to_lowercase();
                    if !self.schema.is_relation(&relation) {
                        return Err(self.unknown_name(
                            &relation,
                            |s| s.is_relation(&relation),
                            CompileError::InvalidRelation {
                                relation: relation.clone(),
                                domain: self.domain,
                                valid: to_strings(self.schema.relations),
                            },
                        ));
                    }
                    self.directives.with.insert(relation);
                }
            }
            "group" => {
                let field = self
                    .once("group", self.directives.group.is_some(), token)?
                    .to_lowercase();
                if !self.schema.groupable.contains(&field.as_str()) {
                    return Err(self.unknown_name(
                        &field,
                        |s| s.groupable.contains(&field.as_str()),
                        CompileError::InvalidGroup {
                            field: field.clone(),
                            domain: self.domain,
                            valid: to_strings(self.schema.groupable),
                        },
                    ));
                }
                self.directives.group = Some(field);
            }
            "view" => {
                let value = self.once("view", self.directives.view.is_some(), token)?;
                let view = View::from_str(&value).ok_or_else(|| CompileError::InvalidView {
                    value: value.clone(),
                    valid: to_strings(View::names()),
                })?;
                self.directives.view = Some(view);
            }
            "save" => {
                let name = self.once("save", self.directives.save.is_some(), token)?;
                self.directives.save = Some(name);
            }
            _ => {
                return Err(CompileError::UnknownDirective {
                    token: token.raw.clone(),
                    name: name.to_string(),
                    valid: to_strings(DIRECTIVES),
                }
                .into())
            }
        }
        Ok(())
    }

    /// `field`, `field+` or `field-`
    fn sort_key(&self, entry: &str) -> QueryResult<SortKey> {
        let (field, direction) = if let Some(f) = entry.strip_suffix('-') {
            (f, SortDirection::Desc)
        } else if let Some(f) = entry.strip_suffix('+') {
            (f, SortDirection::Asc)
        } else {
            (entry, SortDirection::Asc)
        };
        let field = field.to_lowercase();

        if !self.schema.is_sortable(&field) {
            return Err(self.unknown_name(
                &field,
                |s| s.is_sortable(&field),
                CompileError::InvalidColumn {
                    column: field.clone(),
                    domain: self.domain,
                    valid: self.schema.sortable(),
                },
            ));
        }

        Ok(SortKey { field, direction })
    }

    /// A metric or relation named as a column or sort field must be computed
    fn imply(&mut self, name: &str) {
        if self.schema.is_field(name) {
            return;
        }
        if self.schema.is_metric(name) {
            self.directives.metrics.insert(name.to_string());
        } else if self.schema.is_relation(name) {
            self.directives.with.insert(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::lex;

    fn compile_str(input: &str) -> QueryResult<CompiledQuery> {
        match compile(&lex(input)?)? {
            Compilation::Ready(query) => Ok(query),
            Compilation::Load { name, .. } => panic!("unexpected load of {}", name),
        }
    }

    #[test]
    fn test_compile_filters() {
        let query = compile_str("tasks @webapp p1 #urgent -#blocked overdue review").unwrap();
        assert_eq!(query.domain, Domain::Task);
        assert_eq!(
            query.filters,
            vec![
                FilterClause::ProjectEquals { project: "webapp".into() },
                FilterClause::PriorityCompare { op: ComparisonOp::Eq, value: 1 },
                FilterClause::TagPresent { tag: "urgent".into(), negated: false },
                FilterClause::TagPresent { tag: "blocked".into(), negated: true },
                FilterClause::Overdue,
                FilterClause::TextContains { term: "review".into() },
            ]
        );
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(
            parse_priority("<=2"),
            Some(FilterClause::PriorityCompare { op: ComparisonOp::Lte, value: 2 })
        );
        assert_eq!(
            parse_priority(">=1"),
            Some(FilterClause::PriorityCompare { op: ComparisonOp::Gte, value: 1 })
        );
        assert_eq!(
            parse_priority("1..3"),
            Some(FilterClause::PriorityRange { lo: 1, hi: 3 })
        );
        assert_eq!(parse_priority("4"), None);
        assert_eq!(parse_priority("0"), None);
        assert_eq!(parse_priority("3..1"), None);
        assert_eq!(parse_priority("1..5"), None);
        assert_eq!(parse_priority("1x"), None);
    }

    #[test]
    fn test_invalid_priority_carries_raw_token() {
        let err = compile_str("tasks p<=7").unwrap_err();
        assert!(matches!(
            err,
            QueryError::Compile(CompileError::InvalidPriority { ref token }) if token == "p<=7"
        ));
    }

    #[test]
    fn test_invalid_date() {
        let err = compile_str("tasks due:someday").unwrap_err();
        assert!(matches!(
            err,
            QueryError::Compile(CompileError::InvalidDate { ref token }) if token == "due:someday"
        ));
    }

    #[test]
    fn test_status_restricted_to_domain_set() {
        let query = compile_str("projects status:archived").unwrap();
        assert_eq!(
            query.filters,
            vec![FilterClause::StatusEquals { status: "archived".into() }]
        );

        let err = compile_str("tasks status:archived").unwrap_err();
        assert_eq!(err.suggestions(), vec!["pending", "done"]);
    }

    #[test]
    fn test_cross_domain_filter_is_mismatch() {
        let err = compile_str("projects p1").unwrap_err();
        match err {
            QueryError::DomainMismatch(e) => {
                assert_eq!(e.token, "p1");
                assert_eq!(e.domain, Domain::Project);
                assert_eq!(e.valid_in, vec![Domain::Task]);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }

        assert!(matches!(
            compile_str("timelogs #urgent"),
            Err(QueryError::DomainMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_column_lists_domain_columns() {
        let err = compile_str("tasks cols:id,bogus").unwrap_err();
        match err {
            QueryError::Compile(CompileError::InvalidColumn { column, domain, valid }) => {
                assert_eq!(column, "bogus");
                assert_eq!(domain, Domain::Task);
                assert_eq!(valid, crate::query::schema::TASK_SCHEMA.columns());
            }
            other => panic!("expected invalid column, got {:?}", other),
        }
    }

    #[test]
    fn test_column_from_other_domain_is_mismatch() {
        let err = compile_str("tasks cols:id,minutes").unwrap_err();
        assert!(matches!(err, QueryError::DomainMismatch(ref e) if e.token == "minutes"));

        let err = compile_str("tasks metrics:task_count").unwrap_err();
        assert!(matches!(err, QueryError::DomainMismatch(ref e) if e.valid_in == vec![Domain::Project]));
    }

    #[test]
    fn test_invalid_metric_enumerates_valid_names() {
        let err = compile_str("tasks metrics:velocity").unwrap_err();
        match err {
            QueryError::Compile(CompileError::InvalidMetric { metric, valid, .. }) => {
                assert_eq!(metric, "velocity");
                assert_eq!(valid, vec!["time_today", "time_week", "time_month", "overdue_days"]);
            }
            other => panic!("expected invalid metric, got {:?}", other),
        }
    }

    #[test]
    fn test_directives() {
        let query = compile_str(
            "tasks cols:id,text,time_week sort:due+,priority- metrics:overdue_days with:project group:status view:list save:mine",
        )
        .unwrap();
        let d = &query.directives;
        assert_eq!(
            d.columns,
            Some(vec!["id".to_string(), "text".to_string(), "time_week".to_string()])
        );
        assert_eq!(d.sort, vec![SortKey::asc("due"), SortKey::desc("priority")]);
        assert!(d.metrics.contains("time_week"));
        assert!(d.metrics.contains("overdue_days"));
        assert!(d.with.contains("project"));
        assert_eq!(d.group.as_deref(), Some("status"));
        assert_eq!(d.view, Some(View::List));
        assert_eq!(d.save.as_deref(), Some("mine"));
    }

    #[test]
    fn test_sort_default_direction_and_implied_metric() {
        let query = compile_str("projects sort:time_month").unwrap();
        assert_eq!(query.directives.sort, vec![SortKey::asc("time_month")]);
        assert!(query.directives.metrics.contains("time_month"));
    }

    #[test]
    fn test_relation_column_implies_with() {
        let query = compile_str("projects cols:name,tasks").unwrap();
        assert!(query.directives.with.contains("tasks"));
    }

    #[test]
    fn test_unknown_and_duplicate_directives() {
        let err = compile_str("tasks limit:10").unwrap_err();
        assert_eq!(err.kind(), "compile.unknown_directive");
        assert_eq!(err.suggestions().len(), 8);

        let err = compile_str("tasks save:a save:b").unwrap_err();
        assert_eq!(err.kind(), "compile.duplicate_directive");

        let err = compile_str("tasks save:a,b").unwrap_err();
        assert_eq!(err.kind(), "compile.invalid_directive_value");

        let err = compile_str("tasks view:grid").unwrap_err();
        assert_eq!(err.suggestions(), vec!["list", "kanban"]);
    }

    #[test]
    fn test_directive_keys_case_insensitive() {
        let query = compile_str("tasks GROUP:Status Cols:ID").unwrap();
        assert_eq!(query.directives.group.as_deref(), Some("status"));
        assert_eq!(query.directives.columns, Some(vec!["id".to_string()]));
    }

    #[test]
    fn test_domain_required() {
        assert_eq!(compile_str("").unwrap_err().kind(), "compile.missing_domain");
        assert_eq!(compile_str("@webapp").unwrap_err().kind(), "compile.missing_domain");
        assert_eq!(compile_str("notes #x").unwrap_err().kind(), "compile.unknown_domain");
    }

    #[test]
    fn test_load_replaces_invocation() {
        let compiled = compile(&lex("tasks p1 load:weekly").unwrap()).unwrap();
        assert_eq!(
            compiled,
            Compilation::Load {
                name: "weekly".into(),
                discarded: vec!["tasks".into(), "p1".into()],
            }
        );

        let err = compile(&lex("load:a load:b").unwrap()).unwrap_err();
        assert_eq!(err.kind(), "compile.duplicate_directive");
    }

    #[test]
    fn test_text_terms_accumulate() {
        let query = compile_str("tasks fix \"login page\"").unwrap();
        assert_eq!(
            query.filters,
            vec![
                FilterClause::TextContains { term: "fix".into() },
                FilterClause::TextContains { term: "login page".into() },
            ]
        );
    }
}
