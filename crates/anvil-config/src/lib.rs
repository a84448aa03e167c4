//! Anvil Configuration System
//!
//! Provides configuration management for anvil builds:
//! - Project configuration (anvil.toml)
//! - Global user configuration (~/.anvil/config.toml)
//! - Workspace member discovery
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.anvil/config.toml)
//! 2. Project config (./anvil.toml)
//! 3. Environment variables (ANVIL_*)
//!
//! # Example
//!
//! ```no_run
//! use anvil_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the per-project configuration file
pub const PROJECT_FILE: &str = "anvil.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate project name '{name}' in workspace")]
    DuplicateProject { name: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader, LoadedProject};
pub use project::{
    AptSection, CompilerSection, DependenciesSection, KaptSection, ProjectConfig, ProjectSection,
    WorkspaceSection,
};
