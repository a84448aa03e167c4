//! Local artifact repository layout
//!
//! Maps a [`Coordinate`] and a [`FileKind`] to the file it occupies in the
//! local cache:
//!
//! ```text
//! <cache-root>/<group as directories>/<artifact>/<version>/<artifact>-<version><suffix>
//! ```
//!
//! This layout is shared with the artifact fetcher and must stay stable.

use crate::coordinate::Coordinate;
use crate::{PackageError, PackageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Role of an artifact file, which decides its file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Binary archive (`.jar`)
    Jar,
    /// Project metadata (`.pom`)
    Pom,
    /// Documentation archive (`-javadoc.jar`)
    Javadoc,
    /// Source archive (`-sources.jar`)
    Sources,
    /// Uses the coordinate's own extension (e.g. `.aar`)
    Other,
}

impl FileKind {
    /// File name suffix following `<artifact>-<version>`
    pub fn suffix(&self, coordinate: &Coordinate) -> PackageResult<String> {
        let classifier = coordinate
            .classifier
            .as_deref()
            .map(|c| format!("-{}", c))
            .unwrap_or_default();

        let suffix = match self {
            Self::Jar => format!("{}.jar", classifier),
            Self::Pom => ".pom".to_string(),
            Self::Javadoc => "-javadoc.jar".to_string(),
            Self::Sources => "-sources.jar".to_string(),
            Self::Other => {
                let extension = coordinate.extension.as_deref().ok_or_else(|| {
                    PackageError::MissingExtension {
                        coordinate: coordinate.to_string(),
                    }
                })?;
                format!("{}.{}", classifier, extension)
            }
        };

        Ok(suffix)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jar => write!(f, "jar"),
            Self::Pom => write!(f, "pom"),
            Self::Javadoc => write!(f, "javadoc"),
            Self::Sources => write!(f, "sources"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Compute the cache path of `coordinate` for the requested file kind.
///
/// Pure path computation: nothing is read from or written to disk.
pub fn locate(coordinate: &Coordinate, kind: FileKind, cache_root: &Path) -> PackageResult<PathBuf> {
    let suffix = kind.suffix(coordinate)?;

    let mut path = cache_root.to_path_buf();
    for segment in coordinate.group.split('.') {
        path.push(segment);
    }
    path.push(&coordinate.artifact);
    path.push(&coordinate.version);
    path.push(format!("{}-{}{}", coordinate.artifact, coordinate.version, suffix));

    Ok(path)
}

/// Artifact locator bound to a cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    cache_root: PathBuf,
}

impl ArtifactLocator {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Cache path for `coordinate`
    pub fn locate(&self, coordinate: &Coordinate, kind: FileKind) -> PackageResult<PathBuf> {
        locate(coordinate, kind, &self.cache_root)
    }

    /// Directory holding every file of `coordinate`
    pub fn version_dir(&self, coordinate: &Coordinate) -> PathBuf {
        let mut path = self.cache_root.clone();
        for segment in coordinate.group.split('.') {
            path.push(segment);
        }
        path.join(&coordinate.artifact).join(&coordinate.version)
    }

    /// Kind used for the main artifact file: the coordinate's extension if
    /// it names something other than a jar, otherwise [`FileKind::Jar`]
    pub fn primary_kind(coordinate: &Coordinate) -> FileKind {
        match coordinate.extension.as_deref() {
            None | Some("jar") => FileKind::Jar,
            Some("pom") => FileKind::Pom,
            Some(_) => FileKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn root() -> PathBuf {
        PathBuf::from("cache")
    }

    #[test]
    fn test_locate_jar() {
        let coordinate = Coordinate::new("org.testng", "testng", "6.9.11");
        let path = locate(&coordinate, FileKind::Jar, &root()).unwrap();
        let expected: PathBuf = ["cache", "org", "testng", "testng", "6.9.11", "testng-6.9.11.jar"]
            .iter()
            .collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_locate_other_uses_extension() {
        let coordinate = Coordinate::new("io.reactivex", "rxandroid", "1.0.1").with_extension("aar");
        let path = locate(&coordinate, FileKind::Other, &root()).unwrap();
        let expected: PathBuf = [
            "cache",
            "io",
            "reactivex",
            "rxandroid",
            "1.0.1",
            "rxandroid-1.0.1.aar",
        ]
        .iter()
        .collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_locate_other_without_extension_fails() {
        let coordinate = Coordinate::new("io.reactivex", "rxandroid", "1.0.1");
        let result = locate(&coordinate, FileKind::Other, &root());
        match result {
            Err(PackageError::MissingExtension { coordinate }) => {
                assert_eq!(coordinate, "io.reactivex:rxandroid:1.0.1");
            }
            other => panic!("Expected MissingExtension, got {:?}", other),
        }
    }

    #[rstest]
    #[case(FileKind::Jar, "lib-1.2.jar")]
    #[case(FileKind::Pom, "lib-1.2.pom")]
    #[case(FileKind::Javadoc, "lib-1.2-javadoc.jar")]
    #[case(FileKind::Sources, "lib-1.2-sources.jar")]
    fn test_suffix_per_kind(#[case] kind: FileKind, #[case] file_name: &str) {
        let coordinate = Coordinate::new("com.example", "lib", "1.2");
        let path = locate(&coordinate, kind, &root()).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), file_name);
    }

    #[test]
    fn test_classifier_is_part_of_jar_name() {
        let coordinate = Coordinate::new("com.example", "native", "3.0").with_classifier("linux");
        let path = locate(&coordinate, FileKind::Jar, &root()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "native-3.0-linux.jar"
        );
    }

    #[test]
    fn test_primary_kind() {
        let jar = Coordinate::new("g", "a", "1");
        assert_eq!(ArtifactLocator::primary_kind(&jar), FileKind::Jar);
        assert_eq!(
            ArtifactLocator::primary_kind(&jar.clone().with_extension("jar")),
            FileKind::Jar
        );
        assert_eq!(
            ArtifactLocator::primary_kind(&jar.with_extension("aar")),
            FileKind::Other
        );
    }

    #[test]
    fn test_version_dir_contains_located_file() {
        let locator = ArtifactLocator::new(root());
        let coordinate = Coordinate::new("org.testng", "testng", "6.9.11");
        let file = locator.locate(&coordinate, FileKind::Pom).unwrap();
        assert_eq!(file.parent().unwrap(), locator.version_dir(&coordinate));
    }
}
