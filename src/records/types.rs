//! Core record types for the Tasklens query engine
//!
//! This module defines the three record domains a query can target:
//! - `Task`: a unit of work with priority, due date, status and tags
//! - `Project`: a named container that tasks and time logs point at
//! - `TimeLog`: minutes spent on a project (optionally on one task) on a date
//!
//! Records are owned by the record source and only ever borrowed by the
//! evaluator through `RecordRef`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::cmp::Ordering;

/// The record collection a query targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Task,
    Project,
    TimeLog,
}

impl Domain {
    /// Get all domains for iteration
    pub fn all() -> &'static [Domain] {
        &[Domain::Task, Domain::Project, Domain::TimeLog]
    }

    /// Keywords accepted as the leading domain word of a query
    pub fn keywords() -> &'static [&'static str] {
        &["tasks", "task", "projects", "project", "timelogs", "timelog"]
    }

    /// Parse a domain keyword (case-insensitive, singular or plural)
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tasks" | "task" => Some(Self::Task),
            "projects" | "project" => Some(Self::Project),
            "timelogs" | "timelog" => Some(Self::TimeLog),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Task => write!(f, "tasks"),
            Domain::Project => write!(f, "projects"),
            Domain::TimeLog => write!(f, "timelogs"),
        }
    }
}

/// Task priority, 1 (highest) to 3 (lowest)
///
/// Ordering follows importance, so `Priority(1) > Priority(3)`. Sorting by
/// priority descending therefore lists the most important tasks first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: u8 = 1;
    pub const LOWEST: u8 = 3;

    /// Create a priority, returning None outside 1..=3
    pub fn new(value: u8) -> Option<Self> {
        (Self::HIGHEST..=Self::LOWEST)
            .contains(&value)
            .then_some(Self(value))
    }

    /// The numeric level (1 = highest)
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("priority must be 1..3, got {}", value))
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
        }
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        }
    }
}

/// A task record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u32,
    pub text: String,
    /// Name of the owning project
    pub project: String,
    pub priority: Priority,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Task {
    /// Create a pending task with priority 2 and no due date
    pub fn new(id: u32, text: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            project: project.into(),
            priority: Priority(2),
            due: None,
            status: TaskStatus::Pending,
            tags: BTreeSet::new(),
        }
    }

    /// Builder: set priority (values outside 1..=3 are clamped)
    pub fn priority(mut self, level: u8) -> Self {
        self.priority = Priority(level.clamp(Priority::HIGHEST, Priority::LOWEST));
        self
    }

    /// Builder: set due date
    pub fn due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    /// Builder: mark done
    pub fn done(mut self) -> Self {
        self.status = TaskStatus::Done;
        self
    }

    /// Builder: add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Check for a tag, ignoring case
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Pending and due before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == TaskStatus::Pending && self.due.map(|d| d < today).unwrap_or(false)
    }
}

/// A project record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            status: ProjectStatus::Active,
        }
    }

    /// Builder: set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: mark archived
    pub fn archived(mut self) -> Self {
        self.status = ProjectStatus::Archived;
        self
    }
}

/// A time log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeLog {
    pub id: u32,
    pub project: String,
    #[serde(default)]
    pub task_id: Option<u32>,
    pub date: NaiveDate,
    pub minutes: u32,
    #[serde(default)]
    pub note: Option<String>,
}

impl TimeLog {
    pub fn new(id: u32, project: impl Into<String>, date: NaiveDate, minutes: u32) -> Self {
        Self {
            id,
            project: project.into(),
            task_id: None,
            date,
            minutes,
            note: None,
        }
    }

    /// Builder: attach to a task
    pub fn task(mut self, task_id: u32) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Builder: set note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A borrowed record of any domain
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RecordRef<'a> {
    Task(&'a Task),
    Project(&'a Project),
    TimeLog(&'a TimeLog),
}

impl<'a> RecordRef<'a> {
    pub fn domain(&self) -> Domain {
        match self {
            RecordRef::Task(_) => Domain::Task,
            RecordRef::Project(_) => Domain::Project,
            RecordRef::TimeLog(_) => Domain::TimeLog,
        }
    }
}
