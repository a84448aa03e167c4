//! Per-project task graph
//!
//! Built from the tasks every plugin contributes to one project:
//! 1. reject duplicate task ids
//! 2. materialize `reverse_depends_on` as ordinary edges on the named tasks
//! 3. add `depends_on` edges (hard) and `run_after` edges (ordering only)
//! 4. reject cycles, naming the tasks involved
//! 5. fix a deterministic execution order (Kahn's algorithm, ties broken
//!    by plugin registration order, then task id)

use crate::error::{BuildError, BuildResult};
use crate::task::{Task, TaskSummary};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Kind of an edge between two tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// The dependent only runs if the dependency succeeded
    Hard,
    /// Ordering constraint only
    Soft,
}

/// Validated, acyclic task graph for one project
#[derive(Debug, Clone)]
pub struct TaskGraph {
    project: String,
    tasks: Vec<Task>,
    /// Registration index of the contributing plugin, per task
    plugin_order: Vec<usize>,
    index: HashMap<String, usize>,
    /// What each task waits for
    deps: Vec<BTreeMap<usize, EdgeKind>>,
    /// Execution order (indices into `tasks`)
    order: Vec<usize>,
}

impl TaskGraph {
    /// Build the graph for `project` from `(plugin index, task)` contributions
    pub fn build(project: &str, contributions: Vec<(usize, Task)>) -> BuildResult<Self> {
        let (plugin_order, tasks): (Vec<usize>, Vec<Task>) = contributions.into_iter().unzip();

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            if let Some(&first) = index.get(&task.id) {
                return Err(BuildError::DuplicateTask {
                    project: project.to_string(),
                    task: task.id.clone(),
                    first: tasks[first].plugin.clone(),
                    second: task.plugin.clone(),
                });
            }
            index.insert(task.id.clone(), i);
        }

        let lookup = |task: &Task, reference: &str, relation: &'static str| {
            index
                .get(reference)
                .copied()
                .ok_or_else(|| BuildError::UnknownTaskReference {
                    project: project.to_string(),
                    task: task.id.clone(),
                    relation,
                    reference: reference.to_string(),
                })
        };

        let mut deps: Vec<BTreeMap<usize, EdgeKind>> = vec![BTreeMap::new(); tasks.len()];

        for (i, task) in tasks.iter().enumerate() {
            for target in &task.reverse_depends_on {
                let t = lookup(task, target, "reverseDependsOn")?;
                debug!(project, "'{}' now depends on '{}'", target, task.id);
                deps[t].insert(i, EdgeKind::Hard);
            }
        }

        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let d = lookup(task, dep, "dependsOn")?;
                deps[i].insert(d, EdgeKind::Hard);
            }
        }

        for (i, task) in tasks.iter().enumerate() {
            for after in &task.run_after {
                match index.get(after) {
                    Some(&a) => {
                        deps[i].entry(a).or_insert(EdgeKind::Soft);
                    }
                    None => debug!(
                        project,
                        "'{}' runs after '{}', which is not part of this build",
                        task.id,
                        after
                    ),
                }
            }
        }

        Self::from_parts(project, tasks, plugin_order, index, deps)
    }

    fn from_parts(
        project: &str,
        tasks: Vec<Task>,
        plugin_order: Vec<usize>,
        index: HashMap<String, usize>,
        deps: Vec<BTreeMap<usize, EdgeKind>>,
    ) -> BuildResult<Self> {
        let order = match Self::compute_order(&tasks, &plugin_order, &deps) {
            Some(order) => order,
            None => {
                let cycle = Self::find_cycle(&tasks, &plugin_order, &deps);
                return Err(BuildError::CyclicTaskGraph {
                    project: project.to_string(),
                    cycle,
                });
            }
        };

        Ok(Self {
            project: project.to_string(),
            tasks,
            plugin_order,
            index,
            deps,
            order,
        })
    }

    /// Kahn's algorithm; `None` if the graph has a cycle
    fn compute_order(
        tasks: &[Task],
        plugin_order: &[usize],
        deps: &[BTreeMap<usize, EdgeKind>],
    ) -> Option<Vec<usize>> {
        let mut remaining: Vec<usize> = deps.iter().map(|d| d.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (i, edges) in deps.iter().enumerate() {
            for &dep in edges.keys() {
                dependents[dep].push(i);
            }
        }

        let key = |i: usize| (plugin_order[i], tasks[i].id.as_str(), i);
        let mut ready: BTreeSet<_> = (0..tasks.len())
            .filter(|&i| remaining[i] == 0)
            .map(key)
            .collect();

        let mut order = Vec::with_capacity(tasks.len());
        while let Some((_, _, i)) = ready.pop_first() {
            order.push(i);
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(key(dependent));
                }
            }
        }

        (order.len() == tasks.len()).then_some(order)
    }

    /// Find a cycle (for error reporting), rendered as "a -> b -> a"
    fn find_cycle(
        tasks: &[Task],
        plugin_order: &[usize],
        deps: &[BTreeMap<usize, EdgeKind>],
    ) -> String {
        let mut starts: Vec<usize> = (0..tasks.len()).collect();
        starts.sort_by(|&a, &b| {
            (plugin_order[a], &tasks[a].id).cmp(&(plugin_order[b], &tasks[b].id))
        });

        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for start in starts {
            if let Some(cycle) =
                Self::dfs_find_cycle(start, deps, &mut visited, &mut on_stack, &mut path)
            {
                return cycle
                    .into_iter()
                    .map(|i| tasks[i].id.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ");
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle(
        node: usize,
        deps: &[BTreeMap<usize, EdgeKind>],
        visited: &mut HashSet<usize>,
        on_stack: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if on_stack.contains(&node) {
            let start = path.iter().position(|&n| n == node)?;
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }

        if !visited.insert(node) {
            return None;
        }

        on_stack.insert(node);
        path.push(node);

        for &dep in deps[node].keys() {
            if let Some(cycle) = Self::dfs_find_cycle(dep, deps, visited, on_stack, path) {
                return Some(cycle);
            }
        }

        on_stack.remove(&node);
        path.pop();
        None
    }

    /// Restrict the graph to `targets` and everything they hard-depend on
    ///
    /// Ordering-only edges are kept between selected tasks but never pull a
    /// task into the selection.
    pub fn select(&self, targets: &[&str]) -> BuildResult<TaskGraph> {
        let mut keep = BTreeSet::new();
        let mut stack = Vec::new();
        for target in targets {
            let i = self
                .index
                .get(*target)
                .copied()
                .ok_or_else(|| BuildError::TaskNotFound {
                    project: self.project.clone(),
                    task: target.to_string(),
                })?;
            stack.push(i);
        }

        while let Some(i) = stack.pop() {
            if !keep.insert(i) {
                continue;
            }
            for (&dep, kind) in &self.deps[i] {
                if *kind == EdgeKind::Hard {
                    stack.push(dep);
                }
            }
        }

        let remap: HashMap<usize, usize> = keep
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new))
            .collect();

        let tasks: Vec<Task> = keep.iter().map(|&i| self.tasks[i].clone()).collect();
        let plugin_order = keep.iter().map(|&i| self.plugin_order[i]).collect();
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        let deps = keep
            .iter()
            .map(|&i| {
                self.deps[i]
                    .iter()
                    .filter_map(|(dep, kind)| remap.get(dep).map(|&new| (new, *kind)))
                    .collect()
            })
            .collect();

        Self::from_parts(&self.project, tasks, plugin_order, index, deps)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Task ids in execution order
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.tasks[i].id.as_str()).collect()
    }

    /// Task listing in execution order
    pub fn ordered_tasks(&self) -> Vec<TaskSummary> {
        self.order.iter().map(|&i| self.tasks[i].summary()).collect()
    }

    /// Everything `id` waits for, with the kind of each edge
    pub fn edges_of(&self, id: &str) -> Vec<(&str, EdgeKind)> {
        match self.index.get(id) {
            Some(&i) => self.deps[i]
                .iter()
                .map(|(&dep, &kind)| (self.tasks[dep].id.as_str(), kind))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `task` must wait for `other` to succeed
    pub fn depends_on(&self, task: &str, other: &str) -> bool {
        self.edges_of(task)
            .iter()
            .any(|&(dep, kind)| dep == other && kind == EdgeKind::Hard)
    }

    pub(crate) fn task_at(&self, i: usize) -> &Task {
        &self.tasks[i]
    }

    pub(crate) fn execution_order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn deps_at(&self, i: usize) -> &BTreeMap<usize, EdgeKind> {
        &self.deps[i]
    }
}
