//! Transitive dependency resolution
//!
//! Expands declared dependencies through a [`MetadataSource`], applies
//! exclusions and scope filtering, mediates version conflicts (nearest
//! declaration wins) and materializes every winner through an
//! [`ArtifactFetcher`].

use crate::coordinate::{ArtifactKey, Coordinate};
use crate::locator::{ArtifactLocator, FileKind};
use crate::{PackageError, PackageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Dependency scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Provided,
    Test,
}

impl Scope {
    /// Whether a dependency declared with this scope is inherited by dependents
    pub fn is_transitive(&self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }

    /// Scope of a transitive `child` reached through a dependency of this scope
    fn inherit(&self, child: Scope) -> Scope {
        match self {
            Self::Compile => child,
            other => *other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of scopes accepted by a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    scopes: BTreeSet<Scope>,
}

impl ScopeFilter {
    pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Scopes visible when compiling main sources
    pub fn compile() -> Self {
        Self::new([Scope::Compile, Scope::Provided])
    }

    /// Scopes needed to run the project
    pub fn runtime() -> Self {
        Self::new([Scope::Compile, Scope::Runtime])
    }

    /// Every scope
    pub fn test() -> Self {
        Self::new([Scope::Compile, Scope::Runtime, Scope::Provided, Scope::Test])
    }

    pub fn accepts(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// Exclusion pattern: a whole group, or one artifact of a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    pub artifact: Option<String>,
}

impl Exclusion {
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: None,
        }
    }

    pub fn artifact(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: Some(artifact.into()),
        }
    }

    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        self.group == coordinate.group
            && self
                .artifact
                .as_ref()
                .map_or(true, |artifact| *artifact == coordinate.artifact)
    }
}

impl FromStr for Exclusion {
    type Err = PackageError;

    fn from_str(input: &str) -> PackageResult<Self> {
        match input.trim().split(':').collect::<Vec<_>>().as_slice() {
            [group] if !group.is_empty() => Ok(Self::group(*group)),
            [group, artifact] if !group.is_empty() && !artifact.is_empty() => {
                Ok(Self::artifact(*group, *artifact))
            }
            _ => Err(PackageError::InvalidExclusion(input.to_string())),
        }
    }
}

/// Resolution-wide exclusions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    exclusions: Vec<Exclusion>,
}

impl ExclusionFilter {
    pub fn new(exclusions: Vec<Exclusion>) -> Self {
        Self { exclusions }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes(&self, coordinate: &Coordinate) -> bool {
        self.exclusions.iter().any(|e| e.matches(coordinate))
    }
}

/// A dependency as declared by a project or by an artifact's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    /// Excluded from this dependency's subtree
    pub exclusions: Vec<Exclusion>,
}

impl DeclaredDependency {
    pub fn new(coordinate: Coordinate, scope: Scope) -> Self {
        Self {
            coordinate,
            scope,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn compile(coordinate: Coordinate) -> Self {
        Self::new(coordinate, Scope::Compile)
    }

    pub fn with_exclusions(mut self, exclusions: Vec<Exclusion>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Source of an artifact's own dependency list (e.g. a POM reader)
pub trait MetadataSource: Send + Sync {
    fn dependencies_of(&self, coordinate: &Coordinate) -> PackageResult<Vec<DeclaredDependency>>;
}

/// Materializes artifacts as local files
pub trait ArtifactFetcher: Send + Sync {
    /// Local file for `coordinate`, or `None` if it cannot be obtained
    fn fetch(&self, coordinate: &Coordinate, kind: FileKind) -> Option<PathBuf>;
}

/// Fetcher that only serves artifacts already present in the local cache
#[derive(Debug, Clone)]
pub struct LocalRepository {
    locator: ArtifactLocator,
}

impl LocalRepository {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            locator: ArtifactLocator::new(cache_root),
        }
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.locator
    }
}

impl ArtifactFetcher for LocalRepository {
    fn fetch(&self, coordinate: &Coordinate, kind: FileKind) -> Option<PathBuf> {
        let path = self.locator.locate(coordinate, kind).ok()?;
        path.is_file().then_some(path)
    }
}

/// In-memory metadata table; unknown coordinates have no dependencies
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entries: HashMap<Coordinate, Vec<DeclaredDependency>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinate: Coordinate, dependencies: Vec<DeclaredDependency>) {
        self.entries.insert(coordinate, dependencies);
    }

    pub fn with(mut self, coordinate: Coordinate, dependencies: Vec<DeclaredDependency>) -> Self {
        self.insert(coordinate, dependencies);
        self
    }
}

impl MetadataSource for StaticMetadata {
    fn dependencies_of(&self, coordinate: &Coordinate) -> PackageResult<Vec<DeclaredDependency>> {
        Ok(self.entries.get(coordinate).cloned().unwrap_or_default())
    }
}

/// Where a resolved classpath entry came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A repository artifact
    Artifact(Coordinate),
    /// A local file or directory (e.g. generated classes)
    Local,
}

/// A dependency materialized as a local file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedDependency {
    pub origin: Origin,
    pub scope: Scope,
    /// Distance from the declaring project (0 = direct)
    pub depth: usize,
    pub path: PathBuf,
}

impl ResolvedDependency {
    pub fn artifact(coordinate: Coordinate, scope: Scope, depth: usize, path: PathBuf) -> Self {
        Self {
            origin: Origin::Artifact(coordinate),
            scope,
            depth,
            path,
        }
    }

    /// A local path placed on the compile classpath
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Origin::Local,
            scope: Scope::Compile,
            depth: 0,
            path: path.into(),
        }
    }

    pub fn coordinate(&self) -> Option<&Coordinate> {
        match &self.origin {
            Origin::Artifact(coordinate) => Some(coordinate),
            Origin::Local => None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for ResolvedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            Origin::Artifact(coordinate) => write!(f, "{}", coordinate),
            Origin::Local => write!(f, "{}", self.path.display()),
        }
    }
}

/// Join entries into a classpath string using the host path-list separator
pub fn classpath_string(entries: &[ResolvedDependency]) -> PackageResult<String> {
    let joined = std::env::join_paths(entries.iter().map(|e| e.path.as_path())).map_err(|e| {
        PackageError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;
    Ok(joined.to_string_lossy().into_owned())
}

/// Dependency resolver
pub struct DependencyResolver {
    metadata: Arc<dyn MetadataSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
}

/// Winning version for an artifact key
struct Winner {
    coordinate: Coordinate,
    scope: Scope,
    depth: usize,
}

/// Pending node of the breadth-first expansion
struct Pending {
    coordinate: Coordinate,
    scope: Scope,
    depth: usize,
    /// Exclusions inherited from ancestors plus this node's own
    exclusions: Arc<Vec<Exclusion>>,
}

impl DependencyResolver {
    pub fn new(metadata: Arc<dyn MetadataSource>, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self { metadata, fetcher }
    }

    /// Resolve the transitive closure of `declared` for `project`.
    ///
    /// Output order is declaration order of the roots, expanded depth-first,
    /// so classpaths built from it are reproducible. The whole call fails if
    /// any winning coordinate cannot be fetched.
    pub fn resolve(
        &self,
        project: &str,
        declared: &[DeclaredDependency],
        scopes: &ScopeFilter,
        exclusions: &ExclusionFilter,
    ) -> PackageResult<Vec<ResolvedDependency>> {
        let mut winners: HashMap<ArtifactKey, Winner> = HashMap::new();
        let mut children: HashMap<ArtifactKey, Vec<Coordinate>> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut roots = Vec::new();

        for dep in declared {
            if exclusions.excludes(&dep.coordinate) || !scopes.accepts(dep.scope) {
                continue;
            }
            roots.push(dep.coordinate.clone());
            queue.push_back(Pending {
                coordinate: dep.coordinate.clone(),
                scope: dep.scope,
                depth: 0,
                exclusions: Arc::new(dep.exclusions.clone()),
            });
        }

        // Breadth-first: the first time a key is reached is at its smallest depth
        while let Some(node) = queue.pop_front() {
            let key = node.coordinate.key();
            if let Some(existing) = winners.get(&key) {
                if existing.coordinate != node.coordinate {
                    tracing::debug!(
                        project,
                        kept = %existing.coordinate,
                        dropped = %node.coordinate,
                        "version conflict mediated by depth"
                    );
                }
                continue;
            }

            let transitive = self
                .metadata
                .dependencies_of(&node.coordinate)
                .map_err(|e| PackageError::unresolvable(&node.coordinate, e))?;

            let mut accepted = Vec::new();
            for child in transitive {
                if exclusions.excludes(&child.coordinate)
                    || node.exclusions.iter().any(|e| e.matches(&child.coordinate))
                {
                    continue;
                }
                if child.optional || !child.scope.is_transitive() {
                    continue;
                }
                let scope = node.scope.inherit(child.scope);
                if !scopes.accepts(scope) {
                    continue;
                }

                let mut inherited = node.exclusions.as_ref().clone();
                inherited.extend(child.exclusions.iter().cloned());

                accepted.push(child.coordinate.clone());
                queue.push_back(Pending {
                    coordinate: child.coordinate,
                    scope,
                    depth: node.depth + 1,
                    exclusions: Arc::new(inherited),
                });
            }

            children.insert(key.clone(), accepted);
            winners.insert(
                key,
                Winner {
                    coordinate: node.coordinate,
                    scope: node.scope,
                    depth: node.depth,
                },
            );
        }

        // Depth-first ordering over winners only
        let mut ordered = Vec::new();
        let mut emitted = HashSet::new();
        for root in &roots {
            Self::visit(root, &winners, &children, &mut emitted, &mut ordered);
        }

        let mut resolved = Vec::with_capacity(ordered.len());
        for winner in ordered {
            let kind = ArtifactLocator::primary_kind(&winner.coordinate);
            let path = self.fetcher.fetch(&winner.coordinate, kind).ok_or_else(|| {
                PackageError::unresolvable(&winner.coordinate, "not found in any repository")
            })?;
            resolved.push(ResolvedDependency::artifact(
                winner.coordinate.clone(),
                winner.scope,
                winner.depth,
                path,
            ));
        }

        tracing::debug!(project, count = resolved.len(), "resolved dependencies");
        Ok(resolved)
    }

    fn visit<'a>(
        coordinate: &Coordinate,
        winners: &'a HashMap<ArtifactKey, Winner>,
        children: &HashMap<ArtifactKey, Vec<Coordinate>>,
        emitted: &mut HashSet<ArtifactKey>,
        ordered: &mut Vec<&'a Winner>,
    ) {
        let key = coordinate.key();
        let Some(winner) = winners.get(&key) else {
            return;
        };
        if winner.coordinate != *coordinate || !emitted.insert(key.clone()) {
            return;
        }

        ordered.push(winner);
        if let Some(next) = children.get(&key) {
            for child in next {
                Self::visit(child, winners, children, emitted, ordered);
            }
        }
    }
}
