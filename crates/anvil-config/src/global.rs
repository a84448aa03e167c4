//! Global Configuration (~/.anvil/config.toml)
//!
//! Handles user-level configuration stored in `~/.anvil/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.anvil/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Local artifact repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryConfig>,

    /// Build execution settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSettings>,

    /// Compiler executables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerPaths>,
}

/// Local artifact repository settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Root of the local artifact cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<PathBuf>,
}

/// Build execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildSettings {
    /// Worker threads (0 = available parallelism)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Default for running compilers as isolated processes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separate_process: Option<bool>,
}

/// Compiler executables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CompilerPaths {
    /// Java compiler (default: "javac")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java: Option<PathBuf>,

    /// Kotlin compiler used to host the annotation processor (default: "kotlinc")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kotlin: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(root) = self.repository.as_ref().and_then(|r| r.cache_root.as_ref()) {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "repository.cache-root".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.anvil/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".anvil").join("config.toml"))
    }

    /// Default artifact cache (~/.anvil/repository)
    pub fn default_cache_root() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".anvil").join("repository"))
    }

    /// Configured cache root, if any
    pub fn cache_root(&self) -> Option<&Path> {
        self.repository
            .as_ref()
            .and_then(|r| r.cache_root.as_deref())
    }

    /// Configured worker count (0 = available parallelism)
    pub fn workers(&self) -> usize {
        self.build.as_ref().and_then(|b| b.workers).unwrap_or(0)
    }

    pub fn separate_process(&self) -> Option<bool> {
        self.build.as_ref().and_then(|b| b.separate_process)
    }

    pub fn java_compiler(&self) -> PathBuf {
        self.compiler
            .as_ref()
            .and_then(|c| c.java.clone())
            .unwrap_or_else(|| PathBuf::from("javac"))
    }

    pub fn kotlin_compiler(&self) -> PathBuf {
        self.compiler
            .as_ref()
            .and_then(|c| c.kotlin.clone())
            .unwrap_or_else(|| PathBuf::from("kotlinc"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_global_config() {
        let toml = r#"
[repository]
cache-root = "/opt/anvil/cache"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cache_root(), Some(Path::new("/opt/anvil/cache")));
        assert_eq!(config.workers(), 0);
    }

    #[test]
    fn test_parse_full_global_config() {
        let toml = r#"
[repository]
cache-root = "/opt/anvil/cache"

[build]
workers = 4
separate-process = true

[compiler]
java = "/usr/lib/jvm/bin/javac"
kotlin = "/opt/kotlinc/bin/kotlinc"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers(), 4);
        assert_eq!(config.separate_process(), Some(true));
        assert_eq!(config.java_compiler(), PathBuf::from("/usr/lib/jvm/bin/javac"));
    }

    #[test]
    fn test_compiler_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.java_compiler(), PathBuf::from("javac"));
        assert_eq!(config.kotlin_compiler(), PathBuf::from("kotlinc"));
    }

    #[test]
    fn test_empty_cache_root_rejected() {
        let config = GlobalConfig {
            repository: Some(RepositoryConfig {
                cache_root: Some(PathBuf::new()),
            }),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

}
