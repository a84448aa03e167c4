//! Project build order using topological sort
use crate::error::{BuildError, BuildResult};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A project in the workspace dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectNode {
    /// Project name
    pub name: String,
    /// Upstream project names
    pub dependencies: Vec<String>,
}

impl ProjectNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Dependency graph between the projects of one build
///
/// Projects keep their declaration order, which breaks ties in the build order.
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    projects: Vec<ProjectNode>,
    index: HashMap<String, usize>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project; a project with the same name replaces the earlier one
    pub fn add_project(&mut self, project: ProjectNode) {
        match self.index.get(&project.name) {
            Some(&i) => self.projects[i] = project,
            None => {
                self.index.insert(project.name.clone(), self.projects.len());
                self.projects.push(project);
            }
        }
    }

    pub fn get_project(&self, name: &str) -> Option<&ProjectNode> {
        self.index.get(name).map(|&i| &self.projects[i])
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Check that every dependency names a project of this build
    pub fn validate(&self) -> BuildResult<()> {
        for project in &self.projects {
            for dep in &project.dependencies {
                if !self.index.contains_key(dep) {
                    return Err(BuildError::project_not_found(format!(
                        "{} (required by {})",
                        dep, project.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Compute build order using Kahn's algorithm
    /// Upstream projects come first; ties keep declaration order.
    pub fn compute_build_order(&self) -> BuildResult<Vec<String>> {
        self.validate()?;

        let mut in_degree: Vec<usize> = self
            .projects
            .iter()
            .map(|p| p.dependencies.iter().collect::<HashSet<_>>().len())
            .collect();
        let mut ready: BTreeSet<usize> = (0..self.projects.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut result = Vec::new();

        while let Some(i) = ready.pop_first() {
            let name = &self.projects[i].name;
            result.push(name.clone());

            // For each project that depends on the current project
            for (j, project) in self.projects.iter().enumerate() {
                if project.dependencies.contains(name) {
                    in_degree[j] -= 1;
                    if in_degree[j] == 0 {
                        ready.insert(j);
                    }
                }
            }
        }

        if result.len() != self.projects.len() {
            return Err(BuildError::CircularProjectDependency(self.find_cycle()));
        }

        Ok(result)
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> String {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for project in &self.projects {
            if let Some(cycle) =
                self.dfs_find_cycle(&project.name, &mut visited, &mut rec_stack, &mut path)
            {
                return cycle;
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<String> {
        if rec_stack.contains(name) {
            path.push(name.to_string());
            let start = path.iter().position(|p| p == name)?;
            return Some(path[start..].join(" -> "));
        }

        if !visited.insert(name.to_string()) {
            return None;
        }

        rec_stack.insert(name.to_string());
        path.push(name.to_string());

        if let Some(project) = self.get_project(name) {
            for dep in &project.dependencies {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(name);
        path.pop();
        None
    }
}
