//! Project model shared by the configuration and execution phases
//!
//! A `Project` is filled in while plugins are consulted (resolved classpath,
//! contributed source directories, compiler flags) and then handed read-only
//! to every task of its graph.

use crate::error::BuildResult;
use anvil_config::{GlobalConfig, LoadedProject, ProjectConfig};
use anvil_package::{
    Coordinate, DeclaredDependency, Exclusion, ExclusionFilter, ResolvedDependency, Scope,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A buildable project
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Name, unique within a build
    pub name: String,
    /// Absolute project directory
    pub root_dir: PathBuf,
    /// Absolute build output directory
    pub build_dir: PathBuf,
    /// Absolute source directories, in contribution order
    pub source_dirs: Vec<PathBuf>,
    /// Dependencies as declared in configuration
    pub declared: Vec<DeclaredDependency>,
    /// Exclusions applied to the whole resolution
    pub exclusions: Vec<Exclusion>,
    /// Upstream projects in the same build
    pub depends_on: Vec<String>,
    /// Compile classpath, filled in during configuration
    pub dependencies: Vec<ResolvedDependency>,
    /// Compiler flags, filled in during configuration
    pub compiler_flags: Vec<String>,
    /// Run compilers as isolated processes
    pub separate_process: bool,
}

impl Project {
    /// Create a project with the default layout under `root_dir`
    pub fn new(name: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        Self {
            name: name.into(),
            build_dir: root_dir.join(anvil_config::project::DEFAULT_BUILD_DIR),
            source_dirs: vec![root_dir.join(anvil_config::project::DEFAULT_SOURCE_DIR)],
            root_dir,
            declared: Vec::new(),
            exclusions: Vec::new(),
            depends_on: Vec::new(),
            dependencies: Vec::new(),
            compiler_flags: Vec::new(),
            separate_process: false,
        }
    }

    /// Build a project from a loaded workspace member
    pub fn from_config(loaded: &LoadedProject, global: &GlobalConfig) -> BuildResult<Self> {
        let config = &loaded.config;
        let root = &loaded.root;

        let mut declared = Vec::new();
        for (scope, coordinate) in config.dependencies.declared() {
            let coordinate: Coordinate = coordinate.parse()?;
            declared.push(DeclaredDependency::new(coordinate, scope_named(scope)));
        }

        let exclusions = config
            .dependencies
            .exclude
            .iter()
            .map(|pattern| pattern.parse::<Exclusion>())
            .collect::<Result<Vec<_>, _>>()?;

        let separate_process = config
            .compiler
            .as_ref()
            .and_then(|c| c.separate_process)
            .or_else(|| global.separate_process())
            .unwrap_or(false);

        Ok(Self {
            name: loaded.name().to_string(),
            root_dir: root.clone(),
            build_dir: root.join(config.build_dir()),
            source_dirs: config.source_dirs().iter().map(|d| root.join(d)).collect(),
            declared,
            exclusions,
            depends_on: config.depends_on().to_vec(),
            dependencies: Vec::new(),
            compiler_flags: config.compiler_flags().to_vec(),
            separate_process,
        })
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_source_dirs(mut self, source_dirs: Vec<PathBuf>) -> Self {
        self.source_dirs = source_dirs;
        self
    }

    pub fn with_dependencies(mut self, declared: Vec<DeclaredDependency>) -> Self {
        self.declared = declared;
        self
    }

    pub fn with_depends_on(mut self, projects: Vec<String>) -> Self {
        self.depends_on = projects;
        self
    }

    pub fn with_compiler_flags(mut self, flags: Vec<String>) -> Self {
        self.compiler_flags = flags;
        self
    }

    pub fn with_separate_process(mut self, separate_process: bool) -> Self {
        self.separate_process = separate_process;
        self
    }

    /// Directory the main compile pass writes class files into
    pub fn classes_dir(&self) -> PathBuf {
        self.build_dir.join("classes")
    }

    /// Exclusion filter for this project's resolution
    pub fn exclusion_filter(&self) -> ExclusionFilter {
        ExclusionFilter::new(self.exclusions.clone())
    }

    /// Add a source directory; returns false if it was already present
    pub fn add_source_dir(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.source_dirs.contains(&dir) {
            return false;
        }
        self.source_dirs.push(dir);
        true
    }

    /// Append a classpath entry unless its path is already present
    pub fn add_classpath_entry(&mut self, entry: ResolvedDependency) -> bool {
        if self.dependencies.iter().any(|d| d.path == entry.path) {
            return false;
        }
        self.dependencies.push(entry);
        true
    }

    /// Source files under this project's source directories with one of `suffixes`
    pub fn source_files(&self, suffixes: &[String]) -> Vec<PathBuf> {
        collect_sources(&self.source_dirs, suffixes)
    }
}

/// Collect files under `dirs` whose names end with one of `suffixes`, sorted
///
/// Missing directories contribute nothing.
pub fn collect_sources(dirs: &[PathBuf], suffixes: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        files.extend(
            WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_suffix(p, suffixes)),
        );
    }
    files.sort();
    files.dedup();
    files
}

fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    let name = path.to_string_lossy();
    suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

fn scope_named(name: &str) -> Scope {
    match name {
        "runtime" => Scope::Runtime,
        "provided" => Scope::Provided,
        "test" => Scope::Test,
        _ => Scope::Compile,
    }
}

/// Convenience for tests and embedders that already hold a parsed config
pub fn project_from_parts(
    root: impl Into<PathBuf>,
    config: ProjectConfig,
    global: &GlobalConfig,
) -> BuildResult<Project> {
    let loaded = LoadedProject {
        root: root.into(),
        config,
    };
    Project::from_config(&loaded, global)
}
