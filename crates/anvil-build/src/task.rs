//! Tasks contributed by plugins
use crate::context::BuildContext;
use crate::error::BuildResult;
use crate::project::Project;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Body of a task
///
/// A pure function of the frozen project and the build context; anything it
/// needs beyond those is captured read-only when the task is created.
pub type TaskAction = Arc<dyn Fn(&Project, &BuildContext) -> BuildResult<TaskOutput> + Send + Sync>;

/// What a successful task produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutput {
    pub diagnostics: Vec<String>,
    pub up_to_date: bool,
}

/// A named unit of work within one project's graph
#[derive(Clone)]
pub struct Task {
    pub id: String,
    /// Name of the contributing plugin
    pub plugin: String,
    pub description: String,
    pub group: String,
    /// Tasks that must succeed before this one runs
    pub depends_on: Vec<String>,
    /// Tasks that must be made to depend on this one
    pub reverse_depends_on: Vec<String>,
    /// Ordering only: run after these when they are scheduled
    pub run_after: Vec<String>,
    action: TaskAction,
}

impl Task {
    pub fn new<F>(id: impl Into<String>, plugin: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Project, &BuildContext) -> BuildResult<TaskOutput> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            plugin: plugin.into(),
            description: String::new(),
            group: String::new(),
            depends_on: Vec::new(),
            reverse_depends_on: Vec::new(),
            run_after: Vec::new(),
            action: Arc::new(action),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn reverse_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reverse_depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn run_after<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_after.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn run(&self, project: &Project, ctx: &BuildContext) -> BuildResult<TaskOutput> {
        (self.action)(project, ctx)
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            plugin: self.plugin.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("depends_on", &self.depends_on)
            .field("reverse_depends_on", &self.reverse_depends_on)
            .field("run_after", &self.run_after)
            .finish_non_exhaustive()
    }
}

/// Listing entry for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub plugin: String,
    pub description: String,
    pub group: String,
}

/// Why a task was not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A task it depends on, directly or transitively, failed
    UpstreamFailure { task: String },
}

/// Lifecycle of a task within one execution
///
/// Pending -> Eligible -> Running -> Succeeded | Failed, or
/// Pending -> Skipped when an upstream task fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Eligible,
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped(_))
    }

    pub fn can_transition_to(&self, next: &TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Eligible)
                | (Self::Pending, Self::Skipped(_))
                | (Self::Eligible, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Eligible => write!(f, "eligible"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped(SkipReason::UpstreamFailure { task }) => {
                write!(f, "skipped (upstream '{}' failed)", task)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_task_builder() {
        let task = Task::new("runKapt", "apt", |_, _| Ok(TaskOutput::default()))
            .description("Run annotation processors")
            .reverse_depends_on(["compile"])
            .run_after(["clean"]);

        assert_eq!(task.id, "runKapt");
        assert!(task.depends_on.is_empty());
        assert_eq!(task.reverse_depends_on, vec!["compile".to_string()]);
        assert_eq!(task.run_after, vec!["clean".to_string()]);
        assert_eq!(task.summary().description, "Run annotation processors");
    }

    fn skipped() -> TaskState {
        TaskState::Skipped(SkipReason::UpstreamFailure {
            task: "compile".into(),
        })
    }

    #[rstest]
    #[case(TaskState::Pending, TaskState::Eligible, true)]
    #[case(TaskState::Pending, skipped(), true)]
    #[case(TaskState::Eligible, TaskState::Running, true)]
    #[case(TaskState::Running, TaskState::Succeeded, true)]
    #[case(TaskState::Running, TaskState::Failed, true)]
    #[case(TaskState::Running, skipped(), false)]
    #[case(TaskState::Pending, TaskState::Running, false)]
    #[case(TaskState::Succeeded, TaskState::Running, false)]
    #[case(TaskState::Failed, TaskState::Eligible, false)]
    fn test_state_transitions(
        #[case] from: TaskState,
        #[case] to: TaskState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(skipped().is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Eligible.is_terminal());
        assert_eq!(skipped().to_string(), "skipped (upstream 'compile' failed)");
    }
}
