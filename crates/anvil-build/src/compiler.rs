//! Compiler invocation
//!
//! A `CompilationAction` describes one compile pass. The `CompilerInvoker`
//! runs it either in-process through `Compiler::compile` or as an isolated
//! process built by `Compiler::command`, and never lets a compiler failure
//! escape as a panic or error: failures come back as a `CompileResult`.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::task::TaskOutput;
use anvil_package::{classpath_string, ResolvedDependency};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// One compile pass
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationAction {
    /// Working directory for the compiler
    pub directory: PathBuf,
    /// Classpath
    pub dependencies: Vec<ResolvedDependency>,
    pub source_files: Vec<PathBuf>,
    /// Source suffixes this pass compiles (".java", ".kt")
    pub suffixes_being_compiled: Vec<String>,
    pub output_dir: PathBuf,
    pub flags: Vec<String>,
    /// Arguments appended after the flags
    pub extra_args: Vec<String>,
    /// Skip the up-to-date check
    pub force_recompile: bool,
    /// Run the compiler as an isolated process
    pub compiler_separate_process: bool,
}

impl CompilationAction {
    pub fn new(directory: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            dependencies: Vec::new(),
            source_files: Vec::new(),
            suffixes_being_compiled: Vec::new(),
            output_dir: output_dir.into(),
            flags: Vec::new(),
            extra_args: Vec::new(),
            force_recompile: false,
            compiler_separate_process: false,
        }
    }

    pub fn dependencies(mut self, dependencies: Vec<ResolvedDependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn sources(mut self, source_files: Vec<PathBuf>) -> Self {
        self.source_files = source_files;
        self
    }

    pub fn suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes_being_compiled = suffixes;
        self
    }

    pub fn flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn force_recompile(mut self, force: bool) -> Self {
        self.force_recompile = force;
        self
    }

    pub fn separate_process(mut self, separate: bool) -> Self {
        self.compiler_separate_process = separate;
        self
    }

    /// Classpath string for this pass
    pub fn classpath(&self) -> BuildResult<String> {
        Ok(classpath_string(&self.dependencies)?)
    }
}

/// Outcome of one compile pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileResult {
    pub ok: bool,
    /// Compiler output, one line per entry
    pub diagnostics: Vec<String>,
    /// Why the pass failed, when `ok` is false
    pub failure_detail: Option<String>,
    /// The pass was skipped because its output was current
    pub up_to_date: bool,
}

impl CompileResult {
    pub fn success(diagnostics: Vec<String>) -> Self {
        Self {
            ok: true,
            diagnostics,
            failure_detail: None,
            up_to_date: false,
        }
    }

    pub fn failure(detail: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self {
            ok: false,
            diagnostics,
            failure_detail: Some(detail.into()),
            up_to_date: false,
        }
    }

    pub fn up_to_date() -> Self {
        Self {
            ok: true,
            up_to_date: true,
            ..Default::default()
        }
    }

    /// Convert into a task outcome; failures keep the diagnostics verbatim
    pub fn into_task_output(self, task: &str) -> BuildResult<TaskOutput> {
        if self.ok {
            Ok(TaskOutput {
                diagnostics: self.diagnostics,
                up_to_date: self.up_to_date,
            })
        } else {
            Err(BuildError::task_failure(
                task,
                self.failure_detail
                    .unwrap_or_else(|| "compilation failed".to_string()),
                self.diagnostics,
            ))
        }
    }
}

/// A compiler front end
pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    /// Compile inside the current process
    fn compile(&self, action: &CompilationAction) -> CompileResult;

    /// Command line for running this compiler as an isolated process
    ///
    /// `None` means the compiler has no standalone launcher.
    fn command(&self, _action: &CompilationAction) -> Option<Command> {
        None
    }
}

/// A compiler driven through its command line (javac, kotlinc)
#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    name: String,
    program: PathBuf,
}

impl ExternalCompiler {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `-d <out> [-cp <classpath>] <flags> <extra args> <sources>`
    pub fn arguments(&self, action: &CompilationAction) -> BuildResult<Vec<String>> {
        let mut args = vec![
            "-d".to_string(),
            action.output_dir.to_string_lossy().into_owned(),
        ];
        if !action.dependencies.is_empty() {
            args.push("-cp".to_string());
            args.push(action.classpath()?);
        }
        args.extend(action.flags.iter().cloned());
        args.extend(action.extra_args.iter().cloned());
        args.extend(
            action
                .source_files
                .iter()
                .map(|s| s.to_string_lossy().into_owned()),
        );
        Ok(args)
    }

    fn build_command(&self, action: &CompilationAction) -> BuildResult<Command> {
        let mut command = Command::new(&self.program);
        command
            .args(self.arguments(action)?)
            .current_dir(&action.directory);
        Ok(command)
    }
}

impl Compiler for ExternalCompiler {
    fn name(&self) -> &str {
        &self.name
    }

    /// A command-line compiler has no in-process entry point; it always runs
    /// as a child process.
    fn compile(&self, action: &CompilationAction) -> CompileResult {
        match self.build_command(action) {
            Ok(command) => run_process(&self.name, command),
            Err(e) => CompileResult::failure(e.to_string(), Vec::new()),
        }
    }

    fn command(&self, action: &CompilationAction) -> Option<Command> {
        match self.build_command(action) {
            Ok(command) => Some(command),
            Err(e) => {
                warn!(compiler = %self.name, "cannot build command line: {}", e);
                None
            }
        }
    }
}

/// Run a compiler process to completion, capturing its output as diagnostics
pub fn run_process(name: &str, mut command: Command) -> CompileResult {
    debug!(compiler = name, "running {:?}", command);

    let output = match command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|child| child.wait_with_output())
    {
        Ok(output) => output,
        Err(e) => {
            return CompileResult::failure(format!("failed to launch {}: {}", name, e), Vec::new())
        }
    };

    let diagnostics: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .chain(String::from_utf8_lossy(&output.stderr).lines())
        .map(str::to_string)
        .collect();

    if output.status.success() {
        CompileResult::success(diagnostics)
    } else {
        let detail = match output.status.code() {
            Some(code) => format!("{} exited with code {}", name, code),
            None => format!("{} was terminated by a signal", name),
        };
        CompileResult::failure(detail, diagnostics)
    }
}

/// Runs compilation actions
#[derive(Debug, Default, Clone, Copy)]
pub struct CompilerInvoker;

impl CompilerInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Run `action` with `compiler`
    ///
    /// Returns `Err` only when the output directory cannot be prepared;
    /// everything the compiler does wrong is reported in the `CompileResult`.
    pub fn invoke(
        &self,
        project: &Project,
        ctx: &BuildContext,
        compiler: &dyn Compiler,
        action: &CompilationAction,
    ) -> BuildResult<CompileResult> {
        fs::create_dir_all(&action.output_dir)
            .map_err(|e| BuildError::io(&action.output_dir, e))?;

        if !action.force_recompile && ctx.up_to_date().is_up_to_date(action) {
            debug!(
                project = %project.name,
                output = %action.output_dir.display(),
                "compilation is up to date"
            );
            return Ok(CompileResult::up_to_date());
        }

        if action.source_files.is_empty() {
            debug!(
                project = %project.name,
                compiler = compiler.name(),
                suffixes = ?action.suffixes_being_compiled,
                "no sources with these suffixes, compiler not run"
            );
            return Ok(CompileResult::success(Vec::new()));
        }

        let result = if action.compiler_separate_process {
            match compiler.command(action) {
                Some(command) => run_process(compiler.name(), command),
                None => CompileResult::failure(
                    format!("{} cannot run as a separate process", compiler.name()),
                    Vec::new(),
                ),
            }
        } else {
            compiler.compile(action)
        };

        if result.ok && !action.force_recompile {
            if let Err(e) = ctx.up_to_date().record(action) {
                warn!(project = %project.name, "failed to record fingerprint: {}", e);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_external_compiler_arguments() {
        let compiler = ExternalCompiler::new("javac", "javac");
        let action = CompilationAction::new("/work/app", "/work/app/build/classes")
            .dependencies(vec![ResolvedDependency::local("/libs/a.jar")])
            .sources(vec![PathBuf::from("/work/app/src/A.java")])
            .flags(vec!["-g".into()])
            .extra_args(vec!["-Xlint".into()]);

        assert_eq!(
            compiler.arguments(&action).unwrap(),
            vec![
                "-d",
                "/work/app/build/classes",
                "-cp",
                "/libs/a.jar",
                "-g",
                "-Xlint",
                "/work/app/src/A.java"
            ]
        );
    }

    #[test]
    fn test_arguments_omit_empty_classpath() {
        let compiler = ExternalCompiler::new("javac", "javac");
        let action = CompilationAction::new("/w", "/w/out");
        assert_eq!(compiler.arguments(&action).unwrap(), vec!["-d", "/w/out"]);
    }

    #[test]
    fn test_failed_result_becomes_task_failure() {
        let result = CompileResult::failure("javac exited with code 1", vec!["A.java:1: error".into()]);
        match result.into_task_output("compile") {
            Err(BuildError::TaskExecutionFailure {
                task, diagnostics, ..
            }) => {
                assert_eq!(task, "compile");
                assert_eq!(diagnostics, vec!["A.java:1: error".to_string()]);
            }
            other => panic!("Expected TaskExecutionFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_run_process_reports_launch_failure() {
        let result = run_process("ghost", Command::new("/nonexistent/anvil-ghost-compiler"));
        assert!(!result.ok);
        assert!(result.failure_detail.unwrap().contains("failed to launch ghost"));
    }
}
