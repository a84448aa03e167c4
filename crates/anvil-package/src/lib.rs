//! Anvil Package Management
//!
//! Dependency coordinates, the local artifact repository layout, and
//! transitive dependency resolution for JVM-style projects.

pub mod coordinate;
pub mod locator;
pub mod resolver;

pub use coordinate::{ArtifactKey, Coordinate};
pub use locator::{locate, ArtifactLocator, FileKind};
pub use resolver::{
    classpath_string, ArtifactFetcher, DeclaredDependency, DependencyResolver, Exclusion,
    ExclusionFilter, LocalRepository, MetadataSource, Origin, ResolvedDependency, Scope,
    ScopeFilter, StaticMetadata,
};

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Invalid coordinate '{input}': {reason}")]
    InvalidCoordinate { input: String, reason: String },

    #[error("Coordinate {coordinate} has no extension; FileKind::Other requires one")]
    MissingExtension { coordinate: String },

    #[error("Unable to resolve dependency {coordinate}: {reason}")]
    UnresolvableDependency { coordinate: String, reason: String },

    #[error("Invalid exclusion pattern '{0}'")]
    InvalidExclusion(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PackageError {
    /// Create an unresolvable dependency error
    pub fn unresolvable(coordinate: &Coordinate, reason: impl ToString) -> Self {
        Self::UnresolvableDependency {
            coordinate: coordinate.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PackageResult<T> = std::result::Result<T, PackageError>;
