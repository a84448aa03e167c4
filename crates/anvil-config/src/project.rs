//! Project Configuration (anvil.toml)
//!
//! Handles project-level configuration stored in `anvil.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default build output directory, relative to the project root
pub const DEFAULT_BUILD_DIR: &str = "build";
/// Default source directory, relative to the project root
pub const DEFAULT_SOURCE_DIR: &str = "src/main/java";
/// Default apt output directory, relative to the build directory
pub const DEFAULT_APT_OUTPUT_DIR: &str = "generated/source/apt";
/// Default kapt output directory, relative to the build directory
pub const DEFAULT_KAPT_OUTPUT_DIR: &str = "generated/source/kapt";

/// Project configuration from anvil.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project identity and layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSection>,

    /// Declared dependencies, per scope
    #[serde(default)]
    pub dependencies: DependenciesSection,

    /// Compiler configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerSection>,

    /// Simple annotation processing (generated sources + javac flags)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apt: Option<AptSection>,

    /// External annotation processor pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kapt: Option<KaptSection>,

    /// Workspace members (root configs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceSection>,
}

/// `[project]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProjectSection {
    /// Project name, unique within a build
    pub name: String,

    /// Project root relative to the config file (default: its directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Build output directory (default: "build")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    /// Source directories (default: ["src/main/java"])
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_dirs: Vec<PathBuf>,

    /// Other projects in the workspace this one builds against
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// `[dependencies]`: coordinates in `group:artifact[:ext[:classifier]]:version` form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DependenciesSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compile: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provided: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<String>,

    /// Exclusion patterns (`group` or `group:artifact`) applied to the whole resolution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl DependenciesSection {
    /// Every declared coordinate string with its scope name, in declaration order
    pub fn declared(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.compile
            .iter()
            .map(|c| ("compile", c.as_str()))
            .chain(self.provided.iter().map(|c| ("provided", c.as_str())))
            .chain(self.runtime.iter().map(|c| ("runtime", c.as_str())))
            .chain(self.test.iter().map(|c| ("test", c.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.compile.is_empty()
            && self.runtime.is_empty()
            && self.provided.is_empty()
            && self.test.is_empty()
    }
}

/// `[compiler]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CompilerSection {
    /// Extra flags passed to every compile pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    /// Run the compiler as an isolated process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separate_process: Option<bool>,
}

/// `[apt]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AptSection {
    /// Generated source directory, relative to the build directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

impl AptSection {
    pub fn output_dir(&self) -> &str {
        self.output_dir.as_deref().unwrap_or(DEFAULT_APT_OUTPUT_DIR)
    }
}

/// `[kapt]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct KaptSection {
    /// Output root for sources, classes and stubs, relative to the build directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Annotation processor artifacts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    /// Run the processor as an isolated process (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separate_process: Option<bool>,
}

impl KaptSection {
    pub fn output_dir(&self) -> &str {
        self.output_dir.as_deref().unwrap_or(DEFAULT_KAPT_OUTPUT_DIR)
    }
}

/// `[workspace]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Member directories, each holding its own anvil.toml
    #[serde(default)]
    pub members: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Parse and validate a project configuration from TOML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::from_str(&content, path)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(project) = &self.project {
            if project.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "project.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }

            for upstream in &project.depends_on {
                if upstream.trim().is_empty() || *upstream == project.name {
                    return Err(ConfigError::InvalidValue {
                        field: "project.depends-on".to_string(),
                        reason: format!("invalid project reference '{}'", upstream),
                    });
                }
            }
        }

        for (scope, coordinate) in self.dependencies.declared() {
            validate_coordinate(&format!("dependencies.{}", scope), coordinate)?;
        }

        for pattern in &self.dependencies.exclude {
            if !is_valid_exclusion(pattern) {
                return Err(ConfigError::InvalidValue {
                    field: "dependencies.exclude".to_string(),
                    reason: format!("invalid exclusion '{}'", pattern),
                });
            }
        }

        if let Some(kapt) = &self.kapt {
            for processor in &kapt.processors {
                validate_coordinate("kapt.processors", processor)?;
            }
            validate_relative("kapt.output-dir", kapt.output_dir())?;
        }

        if let Some(apt) = &self.apt {
            validate_relative("apt.output-dir", apt.output_dir())?;
        }

        Ok(())
    }

    /// Get the project name, if present
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.name.as_str())
    }

    /// Build directory relative to the project root
    pub fn build_dir(&self) -> PathBuf {
        self.project
            .as_ref()
            .and_then(|p| p.build_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR))
    }

    /// Source directories relative to the project root
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        match &self.project {
            Some(p) if !p.source_dirs.is_empty() => p.source_dirs.clone(),
            _ => vec![PathBuf::from(DEFAULT_SOURCE_DIR)],
        }
    }

    /// Names of upstream projects
    pub fn depends_on(&self) -> &[String] {
        self.project
            .as_ref()
            .map(|p| p.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Compiler flags configured for this project
    pub fn compiler_flags(&self) -> &[String] {
        self.compiler
            .as_ref()
            .map(|c| c.flags.as_slice())
            .unwrap_or(&[])
    }
}

/// Shape check for `group:artifact[:ext[:classifier]]:version`
fn is_valid_coordinate(coordinate: &str) -> bool {
    let parts: Vec<&str> = coordinate.split(':').collect();
    (3..=5).contains(&parts.len()) && parts.iter().all(|p| !p.trim().is_empty())
}

fn validate_coordinate(field: &str, coordinate: &str) -> ConfigResult<()> {
    if !is_valid_coordinate(coordinate) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("invalid coordinate '{}'", coordinate),
        });
    }
    Ok(())
}

fn is_valid_exclusion(pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split(':').collect();
    (1..=2).contains(&parts.len()) && parts.iter().all(|p| !p.trim().is_empty())
}

fn validate_relative(field: &str, path: &str) -> ConfigResult<()> {
    if path.is_empty() || Path::new(path).is_absolute() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' must be a non-empty relative path", path),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_minimal_project_config() {
        let toml = r#"
[project]
name = "app"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project_name(), Some("app"));
        assert_eq!(config.build_dir(), PathBuf::from("build"));
        assert_eq!(config.source_dirs(), vec![PathBuf::from("src/main/java")]);
        assert!(config.kapt.is_none());
    }

    #[test]
    fn test_parse_full_project_config() {
        let toml = r#"
[project]
name = "app"
build-dir = "out"
source-dirs = ["src/main/java", "src/main/kotlin"]
depends-on = ["core"]

[dependencies]
compile = ["com.google.guava:guava:19.0"]
test = ["org.testng:testng:6.9.11"]
exclude = ["commons-logging"]

[compiler]
flags = ["-g"]
separate-process = true

[apt]

[kapt]
output-dir = "kapt"
processors = ["com.google.dagger:dagger-compiler:2.0.2"]
verbose = true
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.build_dir(), PathBuf::from("out"));
        assert_eq!(config.depends_on(), ["core".to_string()]);
        assert_eq!(config.compiler_flags(), ["-g".to_string()]);
        assert_eq!(config.apt.as_ref().unwrap().output_dir(), DEFAULT_APT_OUTPUT_DIR);
        let kapt = config.kapt.as_ref().unwrap();
        assert_eq!(kapt.output_dir(), "kapt");
        assert_eq!(kapt.verbose, Some(true));
    }

    #[test]
    fn test_declared_order_and_scopes() {
        let deps = DependenciesSection {
            compile: vec!["g:a:1".into()],
            runtime: vec!["g:r:1".into()],
            provided: vec!["g:p:1".into()],
            test: vec!["g:t:1".into()],
            exclude: vec![],
        };
        let declared: Vec<_> = deps.declared().collect();
        assert_eq!(
            declared,
            vec![
                ("compile", "g:a:1"),
                ("provided", "g:p:1"),
                ("runtime", "g:r:1"),
                ("test", "g:t:1"),
            ]
        );
    }

    #[rstest]
    #[case("g:a:1", true)]
    #[case("g:a:aar:1", true)]
    #[case("g:a:jar:linux:1", true)]
    #[case("g:a", false)]
    #[case("g::1", false)]
    #[case("a:b:c:d:e:f", false)]
    fn test_coordinate_validation(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(is_valid_coordinate(input), valid);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let config = ProjectConfig {
            project: Some(ProjectSection {
                name: "app".to_string(),
                root: None,
                build_dir: None,
                source_dirs: vec![],
                depends_on: vec!["app".to_string()],
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_output_dir_rejected() {
        let config = ProjectConfig {
            apt: Some(AptSection {
                output_dir: Some("/tmp/generated".to_string()),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
