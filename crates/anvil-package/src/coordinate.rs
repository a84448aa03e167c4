//! Dependency coordinates (`group:artifact[:extension[:classifier]]:version`)

use crate::{PackageError, PackageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a single versioned artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

/// A coordinate with the version stripped, used to detect version conflicts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub group: String,
    pub artifact: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl Coordinate {
    /// Create a new coordinate without classifier or extension
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
            extension: None,
        }
    }

    /// Set the classifier
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Set the extension (packaging)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Same artifact at a different version
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            classifier: self.classifier.clone(),
            extension: self.extension.clone(),
        }
    }
}

impl FromStr for Coordinate {
    type Err = PackageError;

    fn from_str(input: &str) -> PackageResult<Self> {
        let invalid = |reason: &str| PackageError::InvalidCoordinate {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = input.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let coordinate = match parts.as_slice() {
            [group, artifact, version] => Coordinate::new(*group, *artifact, *version),
            [group, artifact, extension, version] => {
                Coordinate::new(*group, *artifact, *version).with_extension(*extension)
            }
            [group, artifact, extension, classifier, version] => {
                Coordinate::new(*group, *artifact, *version)
                    .with_extension(*extension)
                    .with_classifier(*classifier)
            }
            _ => return Err(invalid("expected 3 to 5 ':'-separated segments")),
        };

        Ok(coordinate)
    }
}

impl TryFrom<String> for Coordinate {
    type Error = PackageError;

    fn try_from(value: String) -> PackageResult<Self> {
        value.parse()
    }
}

impl From<Coordinate> for String {
    fn from(coordinate: Coordinate) -> Self {
        coordinate.to_string()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)?;
        match (&self.extension, &self.classifier) {
            (Some(ext), Some(classifier)) => write!(f, ":{}:{}", ext, classifier)?,
            (Some(ext), None) => write!(f, ":{}", ext)?,
            // A classifier needs an extension slot in the string form
            (None, Some(classifier)) => write!(f, ":jar:{}", classifier)?,
            (None, None) => {}
        }
        write!(f, ":{}", self.version)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)?;
        if let Some(ext) = &self.extension {
            write!(f, ":{}", ext)?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}
