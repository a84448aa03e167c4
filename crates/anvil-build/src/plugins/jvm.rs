//! Built-in JVM plugin: `clean` and `compile`
use crate::compiler::{CompilationAction, Compiler, CompilerInvoker};
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::plugin::Plugin;
use crate::project::Project;
use crate::task::{Task, TaskOutput};
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

pub const JVM_PLUGIN: &str = "jvm";
pub const CLEAN_TASK: &str = "clean";
pub const COMPILE_TASK: &str = "compile";

/// Compiles a project's sources into `<build>/classes`
pub struct JvmPlugin {
    compiler: Arc<dyn Compiler>,
    invoker: CompilerInvoker,
    suffixes: Vec<String>,
}

impl JvmPlugin {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            invoker: CompilerInvoker::new(),
            suffixes: vec![".java".to_string()],
        }
    }

    /// Source suffixes the compile task picks up (default: ".java")
    pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes = suffixes;
        self
    }
}

/// Best-effort; a directory that cannot be removed is only reported
fn clean(project: &Project) -> BuildResult<TaskOutput> {
    if !project.build_dir.exists() {
        return Ok(TaskOutput::default());
    }
    debug!(project = %project.name, "removing {}", project.build_dir.display());
    match fs::remove_dir_all(&project.build_dir) {
        Ok(()) => Ok(TaskOutput::default()),
        Err(e) => {
            let message = format!("cannot remove {}: {}", project.build_dir.display(), e);
            warn!(project = %project.name, "{}", message);
            Ok(TaskOutput {
                diagnostics: vec![message],
                up_to_date: false,
            })
        }
    }
}

/// Source roots inside the build directory do not survive `clean`
fn generated_source_dirs(project: &Project) -> BuildResult<()> {
    for dir in &project.source_dirs {
        if dir.starts_with(&project.build_dir) {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
    }
    Ok(())
}

impl Plugin for JvmPlugin {
    fn name(&self) -> &str {
        JVM_PLUGIN
    }

    fn tasks(&self, _project: &Project, _ctx: &BuildContext) -> Vec<Task> {
        let compiler = Arc::clone(&self.compiler);
        let invoker = self.invoker;
        let suffixes = self.suffixes.clone();

        vec![
            Task::new(CLEAN_TASK, JVM_PLUGIN, |project, _ctx| clean(project))
                .description("Delete the build directory")
                .group("build"),
            Task::new(COMPILE_TASK, JVM_PLUGIN, move |project, ctx| {
                generated_source_dirs(project)?;
                let action = CompilationAction::new(&project.root_dir, project.classes_dir())
                    .dependencies(project.dependencies.clone())
                    .sources(project.source_files(&suffixes))
                    .suffixes(suffixes.clone())
                    .flags(project.compiler_flags.clone())
                    .separate_process(project.separate_process);
                invoker
                    .invoke(project, ctx, compiler.as_ref(), &action)?
                    .into_task_output(COMPILE_TASK)
            })
            .description("Compile the project's sources")
            .group("build")
            .run_after([CLEAN_TASK]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileResult;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingCompiler {
        actions: Mutex<Vec<CompilationAction>>,
    }

    impl Compiler for RecordingCompiler {
        fn name(&self) -> &str {
            "recording"
        }

        fn compile(&self, action: &CompilationAction) -> CompileResult {
            self.actions.lock().unwrap().push(action.clone());
            CompileResult::success(Vec::new())
        }
    }

    #[test]
    fn test_compile_task_uses_project_state() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src/main/java");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("Main.java"), "class Main {}").unwrap();

        let compiler = Arc::new(RecordingCompiler::default());
        let plugin = JvmPlugin::new(compiler.clone());
        let project = Project::new("app", temp.path()).with_compiler_flags(vec!["-g".into()]);
        let ctx = BuildContext::new(temp.path().join("cache"));

        let tasks = plugin.tasks(&project, &ctx);
        assert_eq!(tasks[1].run_after, vec![CLEAN_TASK.to_string()]);
        tasks[1].run(&project, &ctx).unwrap();

        let actions = compiler.actions.lock().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].output_dir, project.classes_dir());
        assert_eq!(actions[0].source_files, vec![src.join("Main.java")]);
        assert_eq!(actions[0].flags, vec!["-g".to_string()]);
        assert!(project.classes_dir().is_dir());
    }

    #[test]
    fn test_clean_removes_build_dir() {
        let temp = TempDir::new().unwrap();
        let project = Project::new("app", temp.path());
        fs::create_dir_all(project.classes_dir()).unwrap();

        clean(&project).unwrap();
        assert!(!project.build_dir.exists());

        // Nothing to remove is fine
        clean(&project).unwrap();
    }
}
