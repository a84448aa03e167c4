//! Structured build events for external consumers
use crate::project::Project;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use tracing::debug;

/// Per-project entry of a dependency report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDependencies {
    pub name: String,
    pub depends_on: Vec<String>,
    /// Classpath entries, coordinates or local paths
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BuildEvent {
    /// Emitted once per build, after every project is configured
    #[serde(rename_all = "camelCase")]
    DependencyInfo {
        project_count: usize,
        projects: Vec<ProjectDependencies>,
        /// RFC 3339
        timestamp: String,
    },
}

impl BuildEvent {
    pub fn dependency_info<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let projects: Vec<_> = projects
            .into_iter()
            .map(|p| ProjectDependencies {
                name: p.name.clone(),
                depends_on: p.depends_on.clone(),
                dependencies: p.dependencies.iter().map(|d| d.to_string()).collect(),
            })
            .collect();

        Self::DependencyInfo {
            project_count: projects.len(),
            projects,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Receiver of build events; delivery is fire-and-forget
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BuildEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &BuildEvent) {}
}

/// Writes one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &BuildEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                debug!("dropping build event: {}", e);
                return;
            }
        };
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            debug!("failed to write build event: {}", e);
        }
    }
}
