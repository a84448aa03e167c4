//! Anvil build engine
//!
//! Turns configured projects into executed builds:
//! - Plugin contribution registry (classpath, sources, flags, tasks)
//! - Per-project task graphs with cross-plugin ordering
//! - Parallel task execution with failure propagation
//! - Compiler invocation, in-process or as an isolated process
//! - Annotation processing (apt and the kapt pipeline)

pub mod build_order;
pub mod builder;
pub mod compiler;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod plugin;
pub mod plugins;
pub mod project;
pub mod task;
pub mod task_graph;

// Re-export main types
pub use build_order::{ProjectGraph, ProjectNode};
pub use builder::{BuildReport, Builder, ProjectOutcome, ProjectReport, ProjectSpec};
pub use compiler::{
    run_process, CompilationAction, CompileResult, Compiler, CompilerInvoker, ExternalCompiler,
};
pub use context::{BuildContext, PluginConfig};
pub use error::{BuildError, BuildResult};
pub use events::{BuildEvent, EventSink, JsonLinesSink, NullSink, ProjectDependencies};
pub use executor::{ExecutionReport, Executor, TaskReport};
pub use fingerprint::{FingerprintCheck, NeverUpToDate, UpToDateCheck, FINGERPRINT_FILE};
pub use plugin::{Plugin, PluginRegistry};
pub use project::{collect_sources, Project};
pub use task::{SkipReason, Task, TaskAction, TaskOutput, TaskState, TaskSummary};
pub use task_graph::{EdgeKind, TaskGraph};

// Re-export anvil-package types for convenience
pub use anvil_package::{Coordinate, ResolvedDependency};
