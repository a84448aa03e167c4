//! Configuration loading and workspace discovery tests

use anvil_config::{ConfigError, ConfigLoader, ProjectConfig, PROJECT_FILE};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let config_path = dir.join(PROJECT_FILE);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader(temp: &TempDir) -> ConfigLoader {
    ConfigLoader::new().with_global_config_path(temp.path().join("global.toml"))
}

// ============================================================================
// Project Config Tests
// ============================================================================

#[test]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let config = loader(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(!config.is_project());
    assert_eq!(config.project_name(), None);
}

#[test]
fn test_global_config_is_merged() {
    let temp_dir = TempDir::new().unwrap();
    write_config(temp_dir.path(), "[project]\nname = \"app\"\n");
    fs::write(
        temp_dir.path().join("global.toml"),
        "[repository]\ncache-root = \"/data/anvil\"\n\n[build]\nworkers = 3\n",
    )
    .unwrap();

    let config = loader(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert_eq!(config.cache_root().unwrap(), PathBuf::from("/data/anvil"));
    assert_eq!(config.global.workers(), 3);
}

#[test]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        temp_dir.path(),
        r#"
[project
name = "broken
"#,
    );

    let result = loader(&temp_dir).load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
fn test_unknown_field_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        temp_dir.path(),
        r#"
[kapt]
processor = "com.google.dagger:dagger-compiler:2.0.2"
"#,
    );

    let result = ProjectConfig::load_from_file(&temp_dir.path().join(PROJECT_FILE));
    assert!(result.is_err());
}

#[test]
fn test_invalid_dependency_coordinate() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        temp_dir.path(),
        r#"
[project]
name = "app"

[dependencies]
compile = ["guava"]
"#,
    );

    let result = ProjectConfig::load_from_file(&temp_dir.path().join(PROJECT_FILE));
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_missing_file_reports_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let result = ProjectConfig::load_from_file(&temp_dir.path().join(PROJECT_FILE));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

// ============================================================================
// Workspace Tests
// ============================================================================

#[test]
fn test_load_workspace_members_in_order() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        temp_dir.path(),
        r#"
[workspace]
members = ["core", "app"]
"#,
    );
    write_config(&temp_dir.path().join("core"), "[project]\nname = \"core\"\n");
    write_config(
        &temp_dir.path().join("app"),
        r#"
[project]
name = "app"
depends-on = ["core"]

[kapt]
processors = ["com.google.dagger:dagger-compiler:2.0.2"]
"#,
    );

    let projects = loader(&temp_dir).load_workspace(temp_dir.path()).unwrap();

    let names: Vec<_> = projects.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["core", "app"]);
    assert_eq!(projects[1].root, temp_dir.path().join("app"));
    assert_eq!(projects[1].config.depends_on(), ["core".to_string()]);
    assert!(projects[1].config.kapt.is_some());
}

#[test]
fn test_single_project_workspace() {
    let temp_dir = TempDir::new().unwrap();
    write_config(temp_dir.path(), "[project]\nname = \"solo\"\nroot = \"module\"\n");

    let projects = loader(&temp_dir).load_workspace(temp_dir.path()).unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].root, temp_dir.path().join("module"));
}

#[test]
fn test_duplicate_project_names_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_config(temp_dir.path(), "[workspace]\nmembers = [\"a\", \"b\"]\n");
    write_config(&temp_dir.path().join("a"), "[project]\nname = \"same\"\n");
    write_config(&temp_dir.path().join("b"), "[project]\nname = \"same\"\n");

    let result = loader(&temp_dir).load_workspace(temp_dir.path());

    match result {
        Err(ConfigError::DuplicateProject { name }) => assert_eq!(name, "same"),
        other => panic!("Expected DuplicateProject, got {:?}", other),
    }
}

#[test]
fn test_member_without_project_section_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_config(temp_dir.path(), "[workspace]\nmembers = [\"lib\"]\n");
    write_config(&temp_dir.path().join("lib"), "[dependencies]\n");

    let result = loader(&temp_dir).load_workspace(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
