//! Build orchestration across the projects of a workspace
//!
//! A build runs in two phases:
//! 1. configuration (single-threaded): plugins read their config sections,
//!    each project's classpath is resolved and every plugin contributes
//!    source directories, classpath entries and compiler flags
//! 2. execution: each project's task graph is built and run, upstream
//!    projects first
use crate::build_order::{ProjectGraph, ProjectNode};
use crate::compiler::{Compiler, ExternalCompiler};
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::events::BuildEvent;
use crate::executor::{ExecutionReport, Executor};
use crate::fingerprint::FingerprintCheck;
use crate::plugin::{Plugin, PluginRegistry};
use crate::plugins::apt::{AnnotationProcessingPlugin, DEFAULT_KOTLIN_VERSION};
use crate::plugins::jvm::JvmPlugin;
use crate::project::Project;
use crate::task::{TaskState, TaskSummary};
use crate::task_graph::TaskGraph;
use anvil_config::{ConfigError, ConfigLoader, GlobalConfig, LoadedProject, ProjectConfig};
use anvil_package::{
    DependencyResolver, LocalRepository, MetadataSource, ResolvedDependency, ScopeFilter,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A project together with the configuration its plugins read
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub project: Project,
    pub config: ProjectConfig,
}

impl ProjectSpec {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            config: ProjectConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProjectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn from_loaded(loaded: &LoadedProject, global: &GlobalConfig) -> BuildResult<Self> {
        Ok(Self {
            project: Project::from_config(loaded, global)?,
            config: loaded.config.clone(),
        })
    }

    /// Load every project of the workspace rooted at `root`
    pub fn load_workspace(root: &Path, global: &GlobalConfig) -> BuildResult<Vec<Self>> {
        ConfigLoader::new()
            .load_workspace(root)?
            .iter()
            .map(|loaded| Self::from_loaded(loaded, global))
            .collect()
    }
}

/// How one project's build ended
#[derive(Debug)]
pub enum ProjectOutcome {
    /// The task graph ran; individual tasks may still have failed
    Executed(ExecutionReport),
    /// Configuration or graph construction failed before any task ran
    Failed(BuildError),
    /// Not built because an upstream project did not succeed
    Skipped { upstream: String },
}

impl ProjectOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Executed(report) if report.is_success())
    }
}

#[derive(Debug)]
pub struct ProjectReport {
    pub name: String,
    /// Final task order, for display
    pub tasks: Vec<TaskSummary>,
    pub outcome: ProjectOutcome,
}

/// Result of a whole build
#[derive(Debug, Default)]
pub struct BuildReport {
    /// In build order
    pub projects: Vec<ProjectReport>,
}

impl BuildReport {
    pub fn get(&self, project: &str) -> Option<&ProjectReport> {
        self.projects.iter().find(|p| p.name == project)
    }

    pub fn task_state(&self, project: &str, task: &str) -> Option<&TaskState> {
        match &self.get(project)?.outcome {
            ProjectOutcome::Executed(report) => report.state(task),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.projects.iter().all(|p| p.outcome.is_success())
    }
}

/// Multi-project builder
pub struct Builder {
    registry: PluginRegistry,
    context: BuildContext,
    resolver: Arc<DependencyResolver>,
    executor: Executor,
    compile_suffixes: Vec<String>,
}

impl Builder {
    /// Create a builder with no plugins
    pub fn new(context: BuildContext, resolver: Arc<DependencyResolver>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            context,
            resolver,
            executor: Executor::new(0),
            compile_suffixes: vec![".java".to_string()],
        }
    }

    /// Builder over the local repository at `cache_root` with the JVM and
    /// annotation processing plugins, compilers taken from `global`
    pub fn standard(
        cache_root: impl Into<PathBuf>,
        global: &GlobalConfig,
        metadata: Arc<dyn MetadataSource>,
    ) -> BuildResult<Self> {
        let cache_root = cache_root.into();
        let resolver = Arc::new(DependencyResolver::new(
            metadata,
            Arc::new(LocalRepository::new(&cache_root)),
        ));
        let javac: Arc<dyn Compiler> = Arc::new(ExternalCompiler::new("javac", global.java_compiler()));
        let kotlinc: Arc<dyn Compiler> =
            Arc::new(ExternalCompiler::new("kotlinc", global.kotlin_compiler()));

        let context = BuildContext::new(cache_root).with_up_to_date(Arc::new(FingerprintCheck));
        let mut builder = Self::new(context, Arc::clone(&resolver)).with_workers(global.workers());
        builder.register(Arc::new(JvmPlugin::new(Arc::clone(&javac))))?;
        builder.register(Arc::new(AnnotationProcessingPlugin::new(
            resolver,
            kotlinc,
            javac,
            AnnotationProcessingPlugin::processor_library(DEFAULT_KOTLIN_VERSION),
        )))?;
        Ok(builder)
    }

    /// Worker threads per project graph (0 = available parallelism)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.executor = Executor::new(workers);
        self
    }

    /// Suffixes of the main compile pass, used when asking for compiler flags
    pub fn with_compile_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.compile_suffixes = suffixes;
        self
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> BuildResult<()> {
        self.registry.register(plugin)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Build every task of every project
    pub fn build(self, specs: Vec<ProjectSpec>) -> BuildResult<BuildReport> {
        self.run(specs, None)
    }

    /// Build only `targets` (and what they depend on) in each project that has them
    pub fn build_tasks(self, specs: Vec<ProjectSpec>, targets: &[&str]) -> BuildResult<BuildReport> {
        self.run(specs, Some(targets))
    }

    fn run(mut self, specs: Vec<ProjectSpec>, targets: Option<&[&str]>) -> BuildResult<BuildReport> {
        let started = Instant::now();

        let mut graph = ProjectGraph::new();
        let mut by_name = HashMap::new();
        for spec in specs {
            let name = spec.project.name.clone();
            graph.add_project(
                ProjectNode::new(&name).with_dependencies(spec.project.depends_on.clone()),
            );
            if by_name.insert(name.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateProject { name }.into());
            }
        }
        let order = graph.compute_build_order()?;

        let mut failures: HashMap<String, BuildError> = HashMap::new();
        for name in &order {
            let Some(spec) = by_name.get(name) else {
                continue;
            };
            if let Err(e) = self
                .registry
                .configure_all(&mut self.context, name, &spec.config)
            {
                warn!(project = %name, "plugin configuration failed: {}", e);
                failures.insert(name.clone(), e);
            }
        }

        let mut configured: Vec<Project> = Vec::new();
        let mut unconfigured: Vec<Project> = Vec::new();
        for name in &order {
            let Some(spec) = by_name.remove(name) else {
                continue;
            };
            let mut project = spec.project;
            if failures.contains_key(name) {
                unconfigured.push(project);
                continue;
            }
            info!(project = %project.name, "configuring project");
            match self.configure_project(&mut project, &configured) {
                Ok(()) => configured.push(project),
                Err(e) => {
                    warn!(project = %project.name, "configuration failed: {}", e);
                    failures.insert(project.name.clone(), e);
                    project.dependencies.clear();
                    unconfigured.push(project);
                }
            }
        }

        // Every project of the build, in build order; failed ones carry no classpath
        let listed: Vec<&Project> = order
            .iter()
            .filter_map(|name| configured.iter().chain(&unconfigured).find(|p| &p.name == name))
            .collect();
        self.context
            .events()
            .emit(&BuildEvent::dependency_info(listed));

        let mut report = BuildReport::default();
        let mut succeeded = HashSet::new();
        for name in &order {
            if let Some(error) = failures.remove(name) {
                report.projects.push(ProjectReport {
                    name: name.clone(),
                    tasks: Vec::new(),
                    outcome: ProjectOutcome::Failed(error),
                });
                continue;
            }
            let Some(project) = configured.iter().find(|p| &p.name == name) else {
                continue;
            };

            let blocked = project
                .depends_on
                .iter()
                .find(|upstream| !succeeded.contains(upstream.as_str()));
            if let Some(upstream) = blocked {
                info!(project = %name, "skipped, upstream project '{}' did not succeed", upstream);
                report.projects.push(ProjectReport {
                    name: name.clone(),
                    tasks: Vec::new(),
                    outcome: ProjectOutcome::Skipped {
                        upstream: upstream.clone(),
                    },
                });
                continue;
            }

            let (tasks, outcome) = match self.task_graph(project, targets) {
                Ok(graph) => {
                    info!(project = %name, tasks = graph.len(), "building project");
                    let execution = self.executor.execute(&graph, project, &self.context)?;
                    (graph.ordered_tasks(), ProjectOutcome::Executed(execution))
                }
                Err(e) => {
                    warn!(project = %name, "cannot build task graph: {}", e);
                    (Vec::new(), ProjectOutcome::Failed(e))
                }
            };
            if outcome.is_success() {
                succeeded.insert(name.as_str());
            }
            report.projects.push(ProjectReport {
                name: name.clone(),
                tasks,
                outcome,
            });
        }

        info!(
            projects = report.projects.len(),
            success = report.is_success(),
            "build finished in {:.2?}",
            started.elapsed()
        );
        Ok(report)
    }

    /// Fill in the classpath and plugin contributions of `project`
    fn configure_project(&self, project: &mut Project, upstream: &[Project]) -> BuildResult<()> {
        project.dependencies = self.resolver.resolve(
            &project.name,
            &project.declared,
            &ScopeFilter::compile(),
            &project.exclusion_filter(),
        )?;

        for name in &project.depends_on {
            if let Some(dep) = upstream.iter().find(|p| &p.name == name) {
                project.dependencies.push(ResolvedDependency::local(dep.classes_dir()));
            }
        }

        self.registry.apply_all(project, &self.context)?;

        for dir in self.registry.source_directories(project, &self.context) {
            project.add_source_dir(dir);
        }
        for entry in self.registry.classpath_entries(project, &self.context) {
            project.add_classpath_entry(entry);
        }

        let flags = self.registry.compiler_flags(
            project,
            &self.context,
            &project.compiler_flags,
            &self.compile_suffixes,
        );
        project.compiler_flags.extend(flags);
        Ok(())
    }

    fn task_graph(&self, project: &Project, targets: Option<&[&str]>) -> BuildResult<TaskGraph> {
        let graph = TaskGraph::build(
            &project.name,
            self.registry.tasks(project, &self.context),
        )?;
        match targets {
            Some(targets) => {
                let present: Vec<&str> = targets
                    .iter()
                    .copied()
                    .filter(|t| graph.contains(t))
                    .collect();
                graph.select(&present)
            }
            None => Ok(graph),
        }
    }
}
