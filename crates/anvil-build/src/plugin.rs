//! Plugin contract and the ordered contribution registry
//!
//! Plugins are consulted in registration order; that order is the only
//! thing that decides how their contributions are concatenated.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::task::Task;
use anvil_config::ProjectConfig;
use anvil_package::ResolvedDependency;
use std::path::PathBuf;
use std::sync::Arc;

/// Capabilities a plugin may contribute; every hook is optional
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Read this plugin's section of the project configuration into `ctx`
    fn configure(
        &self,
        _ctx: &mut BuildContext,
        _project: &str,
        _config: &ProjectConfig,
    ) -> BuildResult<()> {
        Ok(())
    }

    /// Called once per project before any other contribution hook
    fn apply(&self, _project: &Project, _ctx: &BuildContext) -> BuildResult<()> {
        Ok(())
    }

    /// Extra compile classpath entries
    fn classpath_entries(&self, _project: &Project, _ctx: &BuildContext) -> Vec<ResolvedDependency> {
        Vec::new()
    }

    /// Extra source directories
    fn source_directories(&self, _project: &Project, _ctx: &BuildContext) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Extra compiler flags for a pass over `suffixes`, given the flags so far
    fn compiler_flags(
        &self,
        _project: &Project,
        _ctx: &BuildContext,
        _current: &[String],
        _suffixes: &[String],
    ) -> Vec<String> {
        Vec::new()
    }

    /// Tasks for this project's graph
    fn tasks(&self, _project: &Project, _ctx: &BuildContext) -> Vec<Task> {
        Vec::new()
    }
}

/// Registered plugins, in registration order
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> BuildResult<()> {
        if self.get(plugin.name()).is_some() {
            return Err(BuildError::DuplicatePlugin(plugin.name().to_string()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Look a plugin up by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn configure_all(
        &self,
        ctx: &mut BuildContext,
        project: &str,
        config: &ProjectConfig,
    ) -> BuildResult<()> {
        for plugin in &self.plugins {
            plugin.configure(ctx, project, config)?;
        }
        Ok(())
    }

    pub fn apply_all(&self, project: &Project, ctx: &BuildContext) -> BuildResult<()> {
        for plugin in &self.plugins {
            plugin.apply(project, ctx)?;
        }
        Ok(())
    }

    pub fn classpath_entries(&self, project: &Project, ctx: &BuildContext) -> Vec<ResolvedDependency> {
        self.plugins
            .iter()
            .flat_map(|p| p.classpath_entries(project, ctx))
            .collect()
    }

    pub fn source_directories(&self, project: &Project, ctx: &BuildContext) -> Vec<PathBuf> {
        self.plugins
            .iter()
            .flat_map(|p| p.source_directories(project, ctx))
            .collect()
    }

    /// Flags contributed by every plugin; each sees the flags contributed before it
    pub fn compiler_flags(
        &self,
        project: &Project,
        ctx: &BuildContext,
        base: &[String],
        suffixes: &[String],
    ) -> Vec<String> {
        let mut current = base.to_vec();
        let mut contributed = Vec::new();
        for plugin in &self.plugins {
            let flags = plugin.compiler_flags(project, ctx, &current, suffixes);
            current.extend(flags.iter().cloned());
            contributed.extend(flags);
        }
        contributed
    }

    /// Every plugin's tasks, tagged with the plugin's registration index
    pub fn tasks(&self, project: &Project, ctx: &BuildContext) -> Vec<(usize, Task)> {
        self.plugins
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.tasks(project, ctx).into_iter().map(move |t| (i, t)))
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskOutput;
    use pretty_assertions::assert_eq;

    struct Contributor {
        name: &'static str,
        dir: &'static str,
        flag: &'static str,
    }

    impl Plugin for Contributor {
        fn name(&self) -> &str {
            self.name
        }

        fn source_directories(&self, _project: &Project, _ctx: &BuildContext) -> Vec<PathBuf> {
            vec![PathBuf::from(self.dir)]
        }

        fn compiler_flags(
            &self,
            _project: &Project,
            _ctx: &BuildContext,
            current: &[String],
            _suffixes: &[String],
        ) -> Vec<String> {
            if current.iter().any(|f| f == self.flag) {
                Vec::new()
            } else {
                vec![self.flag.to_string()]
            }
        }

        fn tasks(&self, _project: &Project, _ctx: &BuildContext) -> Vec<Task> {
            vec![Task::new(
                format!("{}Task", self.name),
                self.name,
                |_, _| Ok(TaskOutput::default()),
            )]
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for (name, dir, flag) in [("first", "gen/a", "-g"), ("second", "gen/b", "-g")] {
            registry
                .register(Arc::new(Contributor { name, dir, flag }))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_contributions_follow_registration_order() {
        let registry = registry();
        let project = Project::new("app", "/work/app");
        let ctx = BuildContext::new("/cache");

        assert_eq!(
            registry.source_directories(&project, &ctx),
            vec![PathBuf::from("gen/a"), PathBuf::from("gen/b")]
        );

        let tasks: Vec<_> = registry
            .tasks(&project, &ctx)
            .into_iter()
            .map(|(i, t)| (i, t.id))
            .collect();
        assert_eq!(
            tasks,
            vec![(0, "firstTask".to_string()), (1, "secondTask".to_string())]
        );
    }

    #[test]
    fn test_flags_see_earlier_contributions() {
        let registry = registry();
        let project = Project::new("app", "/work/app");
        let ctx = BuildContext::new("/cache");

        let flags = registry.compiler_flags(&project, &ctx, &[], &[".java".to_string()]);
        assert_eq!(flags, vec!["-g".to_string()]);
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let mut registry = registry();
        let result = registry.register(Arc::new(Contributor {
            name: "first",
            dir: "x",
            flag: "-x",
        }));
        assert!(matches!(result, Err(BuildError::DuplicatePlugin(name)) if name == "first"));
        assert!(registry.get("second").is_some());
        assert_eq!(registry.len(), 2);
    }
}
