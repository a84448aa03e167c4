//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::{BuildSettings, GlobalConfig, RepositoryConfig};
use crate::project::ProjectConfig;
use crate::{ConfigError, ConfigResult, PROJECT_FILE};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.anvil/config.toml) - lowest priority
/// 2. Project config (./anvil.toml) - overrides global
/// 3. Environment variables (ANVIL_*) - highest priority
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration, with environment overrides applied
    pub global: GlobalConfig,

    /// Project root directory (where anvil.toml was found)
    pub project_root: Option<PathBuf>,
}

/// A workspace member with its resolved root directory
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProject {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl LoadedProject {
    pub fn name(&self) -> &str {
        self.config.project_name().unwrap_or_default()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.anvil/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find anvil.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let global_config = self.load_global_config()?;
        let global_config = self.apply_env_overrides(global_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config()?;
        let global_config = self.apply_env_overrides(global_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load every project of the workspace rooted at `root_dir`
    ///
    /// The root config's own `[project]` (if any) comes first, followed by
    /// `[workspace].members` in declaration order.
    pub fn load_workspace(&mut self, root_dir: &Path) -> ConfigResult<Vec<LoadedProject>> {
        let root_config = ProjectConfig::load_from_file(&root_dir.join(PROJECT_FILE))?;
        let mut projects = Vec::new();

        if root_config.project.is_some() {
            projects.push(Self::loaded(root_dir, root_config.clone()));
        }

        if let Some(workspace) = &root_config.workspace {
            for member in &workspace.members {
                let member_dir = root_dir.join(member);
                let config = ProjectConfig::load_from_file(&member_dir.join(PROJECT_FILE))?;
                if config.project.is_none() {
                    return Err(ConfigError::ValidationError(format!(
                        "workspace member '{}' has no [project] section",
                        member.display()
                    )));
                }
                projects.push(Self::loaded(&member_dir, config));
            }
        }

        if projects.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} declares neither [project] nor [workspace]",
                root_dir.join(PROJECT_FILE).display()
            )));
        }

        let mut seen = HashSet::new();
        for project in &projects {
            if !seen.insert(project.name().to_string()) {
                return Err(ConfigError::DuplicateProject {
                    name: project.name().to_string(),
                });
            }
        }

        Ok(projects)
    }

    fn loaded(config_dir: &Path, config: ProjectConfig) -> LoadedProject {
        let root = match config.project.as_ref().and_then(|p| p.root.as_ref()) {
            Some(relative) => config_dir.join(relative),
            None => config_dir.to_path_buf(),
        };
        LoadedProject { root, config }
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config) or a default config if none is found
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.anvil/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match self.global_config_path.clone() {
            Some(path) => path,
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global config
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to the global config
    ///
    /// Recognized: ANVIL_CACHE_ROOT, ANVIL_WORKERS, ANVIL_SEPARATE_PROCESS
    fn apply_env_overrides(&self, mut config: GlobalConfig) -> ConfigResult<GlobalConfig> {
        if let Ok(root) = env::var("ANVIL_CACHE_ROOT") {
            config
                .repository
                .get_or_insert_with(RepositoryConfig::default)
                .cache_root = Some(PathBuf::from(root));
        }

        if let Ok(workers) = env::var("ANVIL_WORKERS") {
            let workers = workers
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "ANVIL_WORKERS".to_string(),
                    reason: format!("'{}' is not a number", workers),
                })?;
            config.build.get_or_insert_with(BuildSettings::default).workers = Some(workers);
        }

        if let Ok(separate) = env::var("ANVIL_SEPARATE_PROCESS") {
            let separate = matches!(separate.to_lowercase().as_str(), "true" | "1" | "yes");
            config
                .build
                .get_or_insert_with(BuildSettings::default)
                .separate_process = Some(separate);
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the global configuration directory (~/.anvil)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".anvil"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective artifact cache root (global/env > ~/.anvil/repository)
    pub fn cache_root(&self) -> ConfigResult<PathBuf> {
        match self.global.cache_root() {
            Some(root) => Ok(root.to_path_buf()),
            None => GlobalConfig::default_cache_root(),
        }
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Get the project name
    pub fn project_name(&self) -> Option<&str> {
        self.project.project_name()
    }

    /// Check if this is a project (has anvil.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new().with_global_config_path(dir.join("no-global.toml"))
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[project]
name = "test-project"
"#,
        );

        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.project_name(), Some("test-project"));
        assert!(config.is_project());
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[project]
name = "parent-project"
"#,
        );

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let config = loader(temp_dir.path()).load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.project_name(), Some("parent-project"));
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_env_override_cache_root() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[project]\nname = \"app\"\n");

        env::set_var("ANVIL_CACHE_ROOT", "/srv/anvil-cache");

        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.cache_root().unwrap(), PathBuf::from("/srv/anvil-cache"));

        env::remove_var("ANVIL_CACHE_ROOT");
    }

    #[test]
    #[serial]
    fn test_env_override_workers_invalid() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[project]\nname = \"app\"\n");

        env::set_var("ANVIL_WORKERS", "many");

        let result = loader(temp_dir.path()).load_from_directory(temp_dir.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        env::remove_var("ANVIL_WORKERS");
    }

    #[test]
    fn test_load_from_specific_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config_file(temp_dir.path(), "[project]\nname = \"specific\"\n");

        let config = loader(temp_dir.path()).load_from_file(&config_path).unwrap();

        assert_eq!(config.project_name(), Some("specific"));
    }
}
