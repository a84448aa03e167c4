//! Annotation processing
//!
//! Two opt-in modes per project:
//! - apt: generated sources land in `<build>/<apt dir>`, which is added as a
//!   source directory and passed to javac with `-s`
//! - kapt: an external processor pipeline injected ahead of `compile`.
//!   `runKapt` runs the processors and writes stubs and generated sources,
//!   then `compileKapt` compiles those into `<build>/<kapt dir>/classes`,
//!   which sits on the compile classpath.

use crate::compiler::{CompilationAction, Compiler, CompilerInvoker};
use crate::context::{BuildContext, PluginConfig};
use crate::error::{BuildError, BuildResult};
use crate::plugin::Plugin;
use crate::plugins::jvm::{CLEAN_TASK, COMPILE_TASK};
use crate::project::{collect_sources, Project};
use crate::task::{Task, TaskOutput};
use anvil_config::project::{DEFAULT_APT_OUTPUT_DIR, DEFAULT_KAPT_OUTPUT_DIR};
use anvil_config::ProjectConfig;
use anvil_package::{
    Coordinate, DeclaredDependency, DependencyResolver, ExclusionFilter, PackageError,
    ResolvedDependency, ScopeFilter,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const APT_PLUGIN: &str = "apt";
pub const RUN_KAPT_TASK: &str = "runKapt";
pub const COMPILE_KAPT_TASK: &str = "compileKapt";

/// Kotlin release whose annotation processing artifact hosts kapt
pub const DEFAULT_KOTLIN_VERSION: &str = "1.9.24";

/// Compiler plugin id the processor options are addressed to
pub const KAPT_PLUGIN_ID: &str = "org.jetbrains.kotlin.kapt3";

/// Suffix of sources apt processes; passes without it get no apt flags
const APT_SUFFIX: &str = ".java";

/// Simple source generation during the main compile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptConfig {
    /// Relative to the build directory
    pub output_dir: String,
}

impl Default for AptConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_APT_OUTPUT_DIR.to_string(),
        }
    }
}

impl PluginConfig for AptConfig {
    const KIND: &'static str = "apt";
}

/// External annotation processor pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaptConfig {
    /// Relative to the build directory
    pub output_dir: String,
    pub processors: Vec<Coordinate>,
    pub verbose: bool,
    pub separate_process: bool,
}

impl Default for KaptConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_KAPT_OUTPUT_DIR.to_string(),
            processors: Vec::new(),
            verbose: false,
            separate_process: true,
        }
    }
}

impl PluginConfig for KaptConfig {
    const KIND: &'static str = "kapt";
}

/// Output locations of the kapt pipeline for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaptDirs {
    pub root: PathBuf,
    pub sources: PathBuf,
    pub classes: PathBuf,
    pub stubs: PathBuf,
}

impl KaptDirs {
    pub fn new(project: &Project, config: &KaptConfig) -> Self {
        let root = project.build_dir.join(&config.output_dir);
        Self {
            sources: root.join("sources"),
            classes: root.join("classes"),
            stubs: root.join("stubs"),
            root,
        }
    }
}

pub fn apt_dir(project: &Project, config: &AptConfig) -> PathBuf {
    project.build_dir.join(&config.output_dir)
}

/// Processor options for one kapt run
pub fn kapt_flags(
    plugin_jar: &Path,
    dirs: &KaptDirs,
    verbose: bool,
    processor_classpath: &[ResolvedDependency],
) -> Vec<String> {
    let mut options = vec![
        format!("sources={}", dirs.sources.display()),
        format!("classes={}", dirs.classes.display()),
        format!("stubs={}", dirs.stubs.display()),
        format!("verbose={}", verbose),
        "aptOnly=true".to_string(),
    ];
    options.extend(
        processor_classpath
            .iter()
            .map(|dep| format!("apclasspath={}", dep.path.display())),
    );

    let mut flags = vec![format!("-Xplugin={}", plugin_jar.display())];
    for option in options {
        flags.push("-P".to_string());
        flags.push(format!("plugin:{}:{}", KAPT_PLUGIN_ID, option));
    }
    flags
}

/// Collaborators shared by the kapt task bodies
struct KaptTools {
    resolver: Arc<DependencyResolver>,
    invoker: CompilerInvoker,
    kapt_compiler: Arc<dyn Compiler>,
    java_compiler: Arc<dyn Compiler>,
    processor_library: Coordinate,
}

impl KaptTools {
    fn config<'a>(project: &Project, ctx: &'a BuildContext) -> BuildResult<&'a KaptConfig> {
        ctx.config::<KaptConfig>(&project.name)
            .ok_or_else(|| BuildError::MissingConfiguration {
                project: project.name.clone(),
                kind: KaptConfig::KIND,
            })
    }

    fn run_kapt(&self, project: &Project, ctx: &BuildContext) -> BuildResult<TaskOutput> {
        let config = Self::config(project, ctx)?;
        let dirs = KaptDirs::new(project, config);
        for dir in [&dirs.sources, &dirs.stubs, &dirs.classes] {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }

        let declared: Vec<_> = std::iter::once(&self.processor_library)
            .chain(&config.processors)
            .cloned()
            .map(DeclaredDependency::compile)
            .collect();
        let processor_classpath = self.resolver.resolve(
            &project.name,
            &declared,
            &ScopeFilter::runtime(),
            &ExclusionFilter::none(),
        )?;

        let library = self.processor_library.key();
        let plugin_jar = processor_classpath
            .iter()
            .find(|dep| dep.coordinate().is_some_and(|c| c.key() == library))
            .map(|dep| dep.path.clone())
            .ok_or_else(|| {
                PackageError::unresolvable(
                    &self.processor_library,
                    "not on the processor classpath",
                )
            })?;

        let suffixes = vec![".kt".to_string(), ".java".to_string()];
        let action = CompilationAction::new(&project.root_dir, &dirs.classes)
            .dependencies(project.dependencies.clone())
            .sources(project.source_files(&suffixes))
            .suffixes(suffixes)
            .flags(kapt_flags(
                &plugin_jar,
                &dirs,
                config.verbose,
                &processor_classpath,
            ))
            .force_recompile(true)
            .separate_process(config.separate_process);

        self.invoker
            .invoke(project, ctx, self.kapt_compiler.as_ref(), &action)?
            .into_task_output(RUN_KAPT_TASK)
    }

    fn compile_kapt(&self, project: &Project, ctx: &BuildContext) -> BuildResult<TaskOutput> {
        let config = Self::config(project, ctx)?;
        let dirs = KaptDirs::new(project, config);

        let suffixes = vec![".java".to_string()];
        let sources = collect_sources(&[dirs.stubs.clone(), dirs.sources.clone()], &suffixes);
        let action = CompilationAction::new(&project.root_dir, &dirs.classes)
            .dependencies(project.dependencies.clone())
            .sources(sources)
            .suffixes(suffixes)
            .flags(vec!["-proc:none".to_string()])
            .force_recompile(true)
            .separate_process(project.separate_process);

        self.invoker
            .invoke(project, ctx, self.java_compiler.as_ref(), &action)?
            .into_task_output(COMPILE_KAPT_TASK)
    }
}

/// Annotation processing plugin
///
/// Holds direct handles to the resolver and compilers it drives.
pub struct AnnotationProcessingPlugin {
    tools: Arc<KaptTools>,
}

impl AnnotationProcessingPlugin {
    pub fn new(
        resolver: Arc<DependencyResolver>,
        kapt_compiler: Arc<dyn Compiler>,
        java_compiler: Arc<dyn Compiler>,
        processor_library: Coordinate,
    ) -> Self {
        Self {
            tools: Arc::new(KaptTools {
                resolver,
                invoker: CompilerInvoker::new(),
                kapt_compiler,
                java_compiler,
                processor_library,
            }),
        }
    }

    /// The artifact hosting the kapt compiler plugin for `kotlin_version`
    pub fn processor_library(kotlin_version: &str) -> Coordinate {
        Coordinate::new(
            "org.jetbrains.kotlin",
            "kotlin-annotation-processing",
            kotlin_version,
        )
    }

    /// Configuration entry point for apt
    pub fn apt(ctx: &mut BuildContext, project: &str, config: AptConfig) {
        ctx.set_config(project, config);
    }

    /// Configuration entry point for kapt
    pub fn kapt(ctx: &mut BuildContext, project: &str, config: KaptConfig) {
        ctx.set_config(project, config);
    }
}

fn remove_stale(project: &Project, dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(project = %project.name, "removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            project = %project.name,
            "failed to delete {}: {}",
            dir.display(),
            e
        ),
    }
}

impl Plugin for AnnotationProcessingPlugin {
    fn name(&self) -> &str {
        APT_PLUGIN
    }

    fn configure(
        &self,
        ctx: &mut BuildContext,
        project: &str,
        config: &ProjectConfig,
    ) -> BuildResult<()> {
        if let Some(apt) = &config.apt {
            Self::apt(
                ctx,
                project,
                AptConfig {
                    output_dir: apt.output_dir().to_string(),
                },
            );
        }

        if let Some(kapt) = &config.kapt {
            let processors = kapt
                .processors
                .iter()
                .map(|p| p.parse::<Coordinate>())
                .collect::<Result<Vec<_>, _>>()?;
            Self::kapt(
                ctx,
                project,
                KaptConfig {
                    output_dir: kapt.output_dir().to_string(),
                    processors,
                    verbose: kapt.verbose.unwrap_or(false),
                    separate_process: kapt.separate_process.unwrap_or(true),
                },
            );
        }

        Ok(())
    }

    fn apply(&self, project: &Project, ctx: &BuildContext) -> BuildResult<()> {
        if let Some(config) = ctx.config::<AptConfig>(&project.name) {
            let dir = apt_dir(project, config);
            remove_stale(project, &dir);
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!(project = %project.name, "failed to create {}: {}", dir.display(), e);
            }
        }
        if let Some(config) = ctx.config::<KaptConfig>(&project.name) {
            remove_stale(project, &KaptDirs::new(project, config).root);
        }
        Ok(())
    }

    fn classpath_entries(&self, project: &Project, ctx: &BuildContext) -> Vec<ResolvedDependency> {
        let Some(config) = ctx.config::<KaptConfig>(&project.name) else {
            return Vec::new();
        };
        let classes = KaptDirs::new(project, config).classes;
        if let Err(e) = fs::create_dir_all(&classes) {
            warn!(project = %project.name, "failed to create {}: {}", classes.display(), e);
        }
        vec![ResolvedDependency::local(classes)]
    }

    fn source_directories(&self, project: &Project, ctx: &BuildContext) -> Vec<PathBuf> {
        ctx.config::<AptConfig>(&project.name)
            .map(|config| vec![apt_dir(project, config)])
            .unwrap_or_default()
    }

    fn compiler_flags(
        &self,
        project: &Project,
        ctx: &BuildContext,
        current: &[String],
        suffixes: &[String],
    ) -> Vec<String> {
        let Some(config) = ctx.config::<AptConfig>(&project.name) else {
            return Vec::new();
        };
        if !suffixes.iter().any(|s| s == APT_SUFFIX) || current.iter().any(|f| f == "-s") {
            return Vec::new();
        }
        vec![
            "-s".to_string(),
            apt_dir(project, config).to_string_lossy().into_owned(),
        ]
    }

    fn tasks(&self, project: &Project, ctx: &BuildContext) -> Vec<Task> {
        if !ctx.has_config::<KaptConfig>(&project.name) {
            return Vec::new();
        }

        let run = Arc::clone(&self.tools);
        let compile = Arc::clone(&self.tools);
        vec![
            Task::new(RUN_KAPT_TASK, APT_PLUGIN, move |project, ctx| {
                run.run_kapt(project, ctx)
            })
            .description("Run annotation processors")
            .group("build")
            .reverse_depends_on([COMPILE_TASK])
            .run_after([CLEAN_TASK]),
            Task::new(COMPILE_KAPT_TASK, APT_PLUGIN, move |project, ctx| {
                compile.compile_kapt(project, ctx)
            })
            .description("Compile annotation processor output")
            .group("build")
            .depends_on([RUN_KAPT_TASK])
            .reverse_depends_on([COMPILE_TASK]),
        ]
    }
}
