//! Shared fixtures for anvil-build integration tests
#![allow(dead_code)]

use anvil_build::plugins::{AnnotationProcessingPlugin, JvmPlugin};
use anvil_build::{
    BuildContext, BuildEvent, Builder, CompilationAction, CompileResult, Compiler, EventSink,
    ProjectSpec,
};
use anvil_build::project::project_from_parts;
use anvil_config::{GlobalConfig, ProjectConfig};
use anvil_package::{DependencyResolver, LocalRepository, StaticMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const KOTLIN_VERSION: &str = "1.0.0";

/// One recorded compiler call: (compiler name, output dir, action)
pub type CallLog = Arc<Mutex<Vec<(String, PathBuf, CompilationAction)>>>;

/// In-process compiler that records every action
///
/// When the action carries kapt processor options it behaves like the
/// processor and writes a generated source into the `sources=` directory.
pub struct FakeCompiler {
    name: &'static str,
    fail: bool,
    calls: CallLog,
}

impl FakeCompiler {
    pub fn new(name: &'static str, calls: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            calls: Arc::clone(calls),
        })
    }

    pub fn failing(name: &'static str, calls: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: true,
            calls: Arc::clone(calls),
        })
    }
}

impl Compiler for FakeCompiler {
    fn name(&self) -> &str {
        self.name
    }

    fn compile(&self, action: &CompilationAction) -> CompileResult {
        self.calls.lock().unwrap().push((
            self.name.to_string(),
            action.output_dir.clone(),
            action.clone(),
        ));

        if self.fail {
            return CompileResult::failure(
                format!("{} exited with code 1", self.name),
                vec!["e: Main.kt: (3, 5): unresolved reference: Inject".to_string()],
            );
        }

        for flag in &action.flags {
            if let Some(dir) = flag.strip_prefix("plugin:org.jetbrains.kotlin.kapt3:sources=") {
                fs::write(Path::new(dir).join("Generated.java"), "class Generated {}").unwrap();
            }
        }
        CompileResult::success(Vec::new())
    }
}

/// Sink that keeps every event
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<BuildEvent>>,
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &BuildEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Local repository holding the kapt processor library
pub fn populate_cache(root: &Path) -> PathBuf {
    let cache = root.join("cache");
    let dir = cache
        .join("org/jetbrains/kotlin/kotlin-annotation-processing")
        .join(KOTLIN_VERSION);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(format!("kotlin-annotation-processing-{}.jar", KOTLIN_VERSION)),
        "",
    )
    .unwrap();
    cache
}

/// Builder with the JVM and annotation processing plugins over fake compilers
pub fn builder(
    cache: &Path,
    kotlinc: Arc<FakeCompiler>,
    javac: Arc<FakeCompiler>,
    sink: Option<Arc<CollectingSink>>,
) -> Builder {
    let resolver = Arc::new(DependencyResolver::new(
        Arc::new(StaticMetadata::new()),
        Arc::new(LocalRepository::new(cache)),
    ));
    let mut context = BuildContext::new(cache);
    if let Some(sink) = sink {
        context = context.with_event_sink(sink);
    }

    let mut builder = Builder::new(context, Arc::clone(&resolver)).with_workers(2);
    builder
        .register(Arc::new(JvmPlugin::new(javac.clone())))
        .unwrap();
    builder
        .register(Arc::new(AnnotationProcessingPlugin::new(
            resolver,
            kotlinc,
            javac,
            AnnotationProcessingPlugin::processor_library(KOTLIN_VERSION),
        )))
        .unwrap();
    builder
}

/// Project under `root/name` with one Java source file
///
/// `config` is the project's `anvil.toml` content.
pub fn java_project(root: &TempDir, name: &str, config: &str) -> ProjectSpec {
    let dir = root.path().join(name);
    let src = dir.join("src/main/java");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("Main.java"), "class Main {}").unwrap();

    let config = ProjectConfig::from_str(config, &dir.join("anvil.toml")).unwrap();
    let project = project_from_parts(&dir, config.clone(), &GlobalConfig::default()).unwrap();
    ProjectSpec::new(project).with_config(config)
}
