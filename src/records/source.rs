//! Record Source - read-only in-memory collections
//!
//! Holds the task, project and time log collections a query is evaluated
//! against. The evaluator only ever borrows from a `RecordSource`.
//!
//! Collections can be built in memory or loaded from a data directory
//! containing `tasks.json`, `projects.json` and `timelogs.json`. A missing
//! file is treated as an empty collection.

use crate::records::error::{SourceError, SourceResult};
use crate::records::types::{Project, Task, TimeLog};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const TASKS_FILE: &str = "tasks.json";
pub const PROJECTS_FILE: &str = "projects.json";
pub const TIMELOGS_FILE: &str = "timelogs.json";

/// The three record collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSource {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    timelogs: Vec<TimeLog>,
}

impl RecordSource {
    /// Create a source from in-memory collections
    pub fn new(tasks: Vec<Task>, projects: Vec<Project>, timelogs: Vec<TimeLog>) -> Self {
        Self {
            tasks,
            projects,
            timelogs,
        }
    }

    /// Load all collections from a data directory
    pub fn load_dir(dir: &Path) -> SourceResult<Self> {
        let source = Self {
            tasks: Self::load_collection(&dir.join(TASKS_FILE))?,
            projects: Self::load_collection(&dir.join(PROJECTS_FILE))?,
            timelogs: Self::load_collection(&dir.join(TIMELOGS_FILE))?,
        };

        tracing::debug!(
            "Loaded {} tasks, {} projects, {} time logs from {:?}",
            source.tasks.len(),
            source.projects.len(),
            source.timelogs.len(),
            dir
        );

        Ok(source)
    }

    fn load_collection<T: DeserializeOwned>(path: &Path) -> SourceResult<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn timelogs(&self) -> &[TimeLog] {
        &self.timelogs
    }

    /// Total number of records across all collections
    pub fn len(&self) -> usize {
        self.tasks.len() + self.projects.len() + self.timelogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
