//! Metric Engine
//!
//! Computes derived per-row values by joining a row against the related
//! collections, and resolves `with:` relation handles.
//!
//! # Joins
//!
//! ```text
//! Task.id      ← TimeLog.task_id    time_today, time_week, time_month, with:time
//! Task.project → Project.name       with:project
//! Project.name ← Task.project       task_count, overdue_task_count, with:tasks
//!              ← TimeLog.task_id    time_week, time_month (through the project's tasks)
//! Project.name ← TimeLog.project    with:time
//! ```
//!
//! The join maps are built once per evaluation by [`RelationIndex::build`];
//! each lookup afterwards is a HashMap hit.

use crate::query::dates::{DateWindow, EvalContext};
use crate::records::{Project, RecordRef, RecordSource, Task, TimeLog};
use std::collections::HashMap;

/// HashMap join index over a record source
#[derive(Debug, Default)]
pub struct RelationIndex<'a> {
    tasks_by_id: HashMap<u32, &'a Task>,
    tasks_by_project: HashMap<&'a str, Vec<&'a Task>>,
    projects_by_name: HashMap<&'a str, &'a Project>,
    logs_by_task: HashMap<u32, Vec<&'a TimeLog>>,
    logs_by_project: HashMap<&'a str, Vec<&'a TimeLog>>,
}

impl<'a> RelationIndex<'a> {
    /// Index every collection of the source
    pub fn build(source: &'a RecordSource) -> Self {
        let mut index = Self::default();

        for task in source.tasks() {
            index.tasks_by_id.insert(task.id, task);
            index
                .tasks_by_project
                .entry(task.project.as_str())
                .or_default()
                .push(task);
        }

        for project in source.projects() {
            index.projects_by_name.insert(project.name.as_str(), project);
        }

        for log in source.timelogs() {
            if let Some(task_id) = log.task_id {
                index.logs_by_task.entry(task_id).or_default().push(log);
            }
            index
                .logs_by_project
                .entry(log.project.as_str())
                .or_default()
                .push(log);
        }

        index
    }

    fn task_logs(&self, task: &Task) -> &[&'a TimeLog] {
        self.logs_by_task.get(&task.id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn project_logs(&self, name: &str) -> &[&'a TimeLog] {
        self.logs_by_project.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn project_tasks(&self, name: &str) -> &[&'a Task] {
        self.tasks_by_project.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records reached from `record` through a relation handle
    pub fn related(&self, record: RecordRef<'a>, relation: &str) -> Vec<RecordRef<'a>> {
        match (record, relation) {
            (RecordRef::Task(task), "project") => self
                .projects_by_name
                .get(task.project.as_str())
                .map(|p| vec![RecordRef::Project(*p)])
                .unwrap_or_default(),
            (RecordRef::Task(task), "time") => self
                .task_logs(task)
                .iter()
                .map(|l| RecordRef::TimeLog(*l))
                .collect(),
            (RecordRef::Project(project), "tasks") => self
                .project_tasks(&project.name)
                .iter()
                .map(|t| RecordRef::Task(*t))
                .collect(),
            (RecordRef::Project(project), "time") => self
                .project_logs(&project.name)
                .iter()
                .map(|l| RecordRef::TimeLog(*l))
                .collect(),
            (RecordRef::TimeLog(log), "project") => self
                .projects_by_name
                .get(log.project.as_str())
                .map(|p| vec![RecordRef::Project(*p)])
                .unwrap_or_default(),
            (RecordRef::TimeLog(log), "tasks") => log
                .task_id
                .and_then(|id| self.tasks_by_id.get(&id))
                .map(|t| vec![RecordRef::Task(*t)])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// Sum of minutes for logs dated inside `window`
fn minutes_in(logs: &[&TimeLog], window: DateWindow) -> i64 {
    logs.iter()
        .filter(|l| window.contains(l.date))
        .map(|l| l.minutes as i64)
        .sum()
}

/// Computes metric values relative to one evaluation date
pub struct MetricEngine<'i, 'a> {
    index: &'i RelationIndex<'a>,
    ctx: EvalContext,
    today: DateWindow,
    week: DateWindow,
    month: DateWindow,
}

impl<'i, 'a> MetricEngine<'i, 'a> {
    pub fn new(index: &'i RelationIndex<'a>, ctx: EvalContext) -> Self {
        Self {
            index,
            ctx,
            today: DateWindow::day(ctx.today),
            week: DateWindow::week(ctx.today),
            month: DateWindow::month(ctx.today),
        }
    }

    /// Compute one metric for one record; `None` if the domain has no such metric
    pub fn compute(&self, record: RecordRef<'a>, metric: &str) -> Option<i64> {
        match record {
            RecordRef::Task(task) => self.task_metric(task, metric),
            RecordRef::Project(project) => self.project_metric(project, metric),
            RecordRef::TimeLog(_) => None,
        }
    }

    fn task_metric(&self, task: &Task, metric: &str) -> Option<i64> {
        let logs = self.index.task_logs(task);
        let value = match metric {
            "time_today" => minutes_in(logs, self.today),
            "time_week" => minutes_in(logs, self.week),
            "time_month" => minutes_in(logs, self.month),
            "overdue_days" => overdue_days(task, self.ctx),
            _ => return None,
        };
        Some(value)
    }

    fn project_metric(&self, project: &Project, metric: &str) -> Option<i64> {
        let value = match metric {
            "task_count" => self.index.project_tasks(&project.name).len() as i64,
            "overdue_task_count" => self
                .index
                .project_tasks(&project.name)
                .iter()
                .filter(|t| t.is_overdue(self.ctx.today))
                .count() as i64,
            "time_week" => self.project_minutes(project, self.week),
            "time_month" => self.project_minutes(project, self.month),
            _ => return None,
        };
        Some(value)
    }

    /// Task window sums added up over every task in the project
    fn project_minutes(&self, project: &Project, window: DateWindow) -> i64 {
        self.index
            .project_tasks(&project.name)
            .iter()
            .map(|task| minutes_in(self.index.task_logs(task), window))
            .sum()
    }
}

/// Whole days past due, 0 when not overdue
pub fn overdue_days(task: &Task, ctx: EvalContext) -> i64 {
    match task.due {
        Some(due) if task.is_overdue(ctx.today) => (ctx.today - due).num_days().max(0),
        _ => 0,
    }
}
