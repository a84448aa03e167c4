//! Parallel execution of a task graph
//!
//! Tasks whose dependencies are all settled are dispatched to a fixed-size
//! worker pool. When a task fails, everything that hard-depends on it is
//! marked skipped; independent branches keep running.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::task::{SkipReason, TaskOutput, TaskState};
use crate::task_graph::{EdgeKind, TaskGraph};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub id: String,
    pub plugin: String,
    pub state: TaskState,
    pub diagnostics: Vec<String>,
    /// Failure detail for failed tasks
    pub failure: Option<String>,
    pub up_to_date: bool,
    pub duration: Duration,
}

/// Outcome of running one project's graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub project: String,
    /// In execution order
    pub tasks: Vec<TaskReport>,
}

impl ExecutionReport {
    pub fn get(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn state(&self, id: &str) -> Option<&TaskState> {
        self.get(id).map(|t| &t.state)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(|s| *s == TaskState::Succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(|s| *s == TaskState::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, TaskState::Skipped(_)))
    }

    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Succeeded)
    }

    fn ids_where(&self, predicate: impl Fn(&TaskState) -> bool) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| predicate(&t.state))
            .map(|t| t.id.as_str())
            .collect()
    }
}

/// Worker-pool task executor
#[derive(Debug, Clone)]
pub struct Executor {
    workers: usize,
}

impl Executor {
    /// Create an executor with `workers` threads (0 = available parallelism)
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every task of `graph` against the frozen `project`
    pub fn execute(
        &self,
        graph: &TaskGraph,
        project: &Project,
        ctx: &BuildContext,
    ) -> BuildResult<ExecutionReport> {
        let mut schedule = Schedule::new(graph);
        if graph.is_empty() {
            return Ok(schedule.into_report(graph));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("anvil-worker-{}", i))
            .build()
            .map_err(|e| BuildError::WorkerPool(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<(usize, BuildResult<TaskOutput>, Duration)>();

        pool.in_place_scope(|scope| {
            let mut running = 0usize;
            loop {
                while let Some(i) = schedule.next_ready() {
                    let task = graph.task_at(i);
                    info!(project = %project.name, task = %task.id, "running task");
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let started = Instant::now();
                        let result = panic::catch_unwind(AssertUnwindSafe(|| task.run(project, ctx)))
                            .unwrap_or_else(|_| {
                                Err(BuildError::task_failure(&task.id, "task panicked", Vec::new()))
                            });
                        // The receiver outlives every worker
                        let _ = tx.send((i, result, started.elapsed()));
                    });
                    running += 1;
                }

                if running == 0 {
                    break;
                }

                let Ok((i, result, elapsed)) = rx.recv() else {
                    break;
                };
                running -= 1;
                schedule.finish(graph, project, i, result, elapsed);
            }
        });

        Ok(schedule.into_report(graph))
    }
}

/// Mutable bookkeeping for one execution
struct Schedule {
    states: Vec<TaskState>,
    remaining: Vec<usize>,
    dependents: Vec<Vec<(usize, EdgeKind)>>,
    rank: Vec<usize>,
    ready: BTreeSet<(usize, usize)>,
    diagnostics: Vec<Vec<String>>,
    failures: Vec<Option<String>>,
    up_to_date: Vec<bool>,
    durations: Vec<Duration>,
}

impl Schedule {
    fn new(graph: &TaskGraph) -> Self {
        let n = graph.len();
        let mut rank = vec![0; n];
        for (position, &i) in graph.execution_order().iter().enumerate() {
            rank[i] = position;
        }

        let mut remaining = vec![0; n];
        let mut dependents = vec![Vec::new(); n];
        for (i, slot) in remaining.iter_mut().enumerate() {
            let deps = graph.deps_at(i);
            *slot = deps.len();
            for (&dep, &kind) in deps {
                dependents[dep].push((i, kind));
            }
        }

        let mut schedule = Self {
            states: vec![TaskState::Pending; n],
            remaining,
            dependents,
            rank,
            ready: BTreeSet::new(),
            diagnostics: vec![Vec::new(); n],
            failures: vec![None; n],
            up_to_date: vec![false; n],
            durations: vec![Duration::ZERO; n],
        };
        for i in 0..n {
            if schedule.remaining[i] == 0 {
                schedule.make_eligible(i);
            }
        }
        schedule
    }

    fn set_state(&mut self, i: usize, next: TaskState) {
        debug_assert!(
            self.states[i].can_transition_to(&next),
            "illegal task transition {} -> {}",
            self.states[i],
            next
        );
        self.states[i] = next;
    }

    fn make_eligible(&mut self, i: usize) {
        self.set_state(i, TaskState::Eligible);
        self.ready.insert((self.rank[i], i));
    }

    fn next_ready(&mut self) -> Option<usize> {
        let (_, i) = self.ready.pop_first()?;
        self.set_state(i, TaskState::Running);
        Some(i)
    }

    fn finish(
        &mut self,
        graph: &TaskGraph,
        project: &Project,
        i: usize,
        result: BuildResult<TaskOutput>,
        elapsed: Duration,
    ) {
        let id = graph.task_at(i).id.clone();
        self.durations[i] = elapsed;

        match result {
            Ok(output) => {
                info!(
                    project = %project.name,
                    task = %id,
                    up_to_date = output.up_to_date,
                    "task finished in {:.2?}",
                    elapsed
                );
                self.diagnostics[i] = output.diagnostics;
                self.up_to_date[i] = output.up_to_date;
                self.set_state(i, TaskState::Succeeded);
                self.settle(graph, project, i, None);
            }
            Err(error) => {
                warn!(project = %project.name, task = %id, "task failed: {}", error);
                match error {
                    BuildError::TaskExecutionFailure {
                        detail, diagnostics, ..
                    } => {
                        self.failures[i] = Some(detail);
                        self.diagnostics[i] = diagnostics;
                    }
                    other => self.failures[i] = Some(other.to_string()),
                }
                self.set_state(i, TaskState::Failed);
                self.settle(graph, project, i, Some(id));
            }
        }
    }

    /// Release or skip everything waiting on `i`
    ///
    /// Hard dependents of a task that did not succeed are skipped in turn;
    /// ordering-only dependents just stop waiting.
    fn settle(&mut self, graph: &TaskGraph, project: &Project, i: usize, failed: Option<String>) {
        let mut work = vec![i];
        while let Some(n) = work.pop() {
            let succeeded = self.states[n] == TaskState::Succeeded;
            let edges = self.dependents[n].clone();
            for (d, kind) in edges {
                if self.states[d].is_terminal() {
                    continue;
                }
                match (&failed, kind) {
                    (Some(root), EdgeKind::Hard) if !succeeded => {
                        info!(
                            project = %project.name,
                            task = %graph.task_at(d).id,
                            "skipped, upstream task '{}' failed",
                            root
                        );
                        self.set_state(
                            d,
                            TaskState::Skipped(SkipReason::UpstreamFailure { task: root.clone() }),
                        );
                        work.push(d);
                    }
                    _ => {
                        self.remaining[d] -= 1;
                        if self.remaining[d] == 0 && self.states[d] == TaskState::Pending {
                            self.make_eligible(d);
                        }
                    }
                }
            }
        }
    }

    fn into_report(self, graph: &TaskGraph) -> ExecutionReport {
        let mut tasks = Vec::with_capacity(graph.len());
        for &i in graph.execution_order() {
            let task = graph.task_at(i);
            tasks.push(TaskReport {
                id: task.id.clone(),
                plugin: task.plugin.clone(),
                state: self.states[i].clone(),
                diagnostics: self.diagnostics[i].clone(),
                failure: self.failures[i].clone(),
                up_to_date: self.up_to_date[i],
                duration: self.durations[i],
            });
        }
        ExecutionReport {
            project: graph.project().to_string(),
            tasks,
        }
    }
}
