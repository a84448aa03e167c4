/// Build system error types
use anvil_config::ConfigError;
use anvil_package::PackageError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cyclic task graph in project '{project}': {cycle}")]
    CyclicTaskGraph { project: String, cycle: String },

    #[error("Task '{task}' in project '{project}' names unknown task '{reference}' in {relation}")]
    UnknownTaskReference {
        project: String,
        task: String,
        relation: &'static str,
        reference: String,
    },

    #[error("Task '{task}' in project '{project}' is contributed by both '{first}' and '{second}'")]
    DuplicateTask {
        project: String,
        task: String,
        first: String,
        second: String,
    },

    #[error("Task '{task}' failed: {detail}")]
    TaskExecutionFailure {
        task: String,
        detail: String,
        diagnostics: Vec<String>,
    },

    #[error("Task not found in project '{project}': {task}")]
    TaskNotFound { project: String, task: String },

    #[error("Circular project dependency detected: {0}")]
    CircularProjectDependency(String),

    #[error("Project not found: {project}")]
    ProjectNotFound { project: String },

    #[error("Plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error("Missing {kind} configuration for project '{project}'")]
    MissingConfiguration { project: String, kind: &'static str },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a task failure carrying the tool's diagnostics
    pub fn task_failure(
        task: impl Into<String>,
        detail: impl ToString,
        diagnostics: Vec<String>,
    ) -> Self {
        Self::TaskExecutionFailure {
            task: task.into(),
            detail: detail.to_string(),
            diagnostics,
        }
    }

    /// Create a project not found error
    pub fn project_not_found(project: impl Into<String>) -> Self {
        Self::ProjectNotFound {
            project: project.into(),
        }
    }
}
