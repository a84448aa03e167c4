//! Local repository layout tests

use anvil_package::{locate, ArtifactLocator, Coordinate, FileKind, PackageError};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

fn expected(root: &Path, segments: &[&str]) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment);
    }
    path
}

#[test]
fn test_testng_jar_layout() {
    let root = PathBuf::from("/var/cache/anvil");
    let coordinate = Coordinate::new("org.testng", "testng", "6.9.11");

    let path = locate(&coordinate, FileKind::Jar, &root).unwrap();

    assert_eq!(
        path,
        expected(
            &root,
            &["org", "testng", "testng", "6.9.11", "testng-6.9.11.jar"]
        )
    );
}

#[test]
fn test_aar_layout_uses_coordinate_extension() {
    let root = PathBuf::from("/var/cache/anvil");
    let coordinate: Coordinate = "io.reactivex:rxandroid:aar:1.0.1".parse().unwrap();

    let path = locate(&coordinate, FileKind::Other, &root).unwrap();

    assert_eq!(
        path,
        expected(
            &root,
            &["io", "reactivex", "rxandroid", "1.0.1", "rxandroid-1.0.1.aar"]
        )
    );
}

#[test]
fn test_other_kind_requires_extension() {
    let locator = ArtifactLocator::new("/var/cache/anvil");
    let coordinate = Coordinate::new("org.testng", "testng", "6.9.11");

    assert!(matches!(
        locator.locate(&coordinate, FileKind::Other),
        Err(PackageError::MissingExtension { .. })
    ));
}

#[test]
fn test_locate_touches_nothing_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    let locator = ArtifactLocator::new(temp.path());
    let coordinate = Coordinate::new("com.squareup.okio", "okio", "1.6.0");

    let path = locator.locate(&coordinate, FileKind::Sources).unwrap();

    assert!(path.starts_with(temp.path()));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

fn coordinate() -> impl Strategy<Value = Coordinate> {
    (
        prop::collection::vec(segment(), 1..4),
        segment(),
        "[0-9]{1,2}\\.[0-9]{1,2}(\\.[0-9]{1,2})?",
        prop::option::of(segment()),
    )
        .prop_map(|(group, artifact, version, extension)| {
            let coordinate = Coordinate::new(group.join("."), artifact, version);
            match extension {
                Some(ext) => coordinate.with_extension(ext),
                None => coordinate,
            }
        })
}

fn kind() -> impl Strategy<Value = FileKind> {
    prop_oneof![
        Just(FileKind::Jar),
        Just(FileKind::Pom),
        Just(FileKind::Javadoc),
        Just(FileKind::Sources),
        Just(FileKind::Other),
    ]
}

proptest! {
    #[test]
    fn prop_locate_is_deterministic(coordinate in coordinate(), kind in kind(), root in segment()) {
        let root = PathBuf::from(root);
        let first = locate(&coordinate, kind, &root);
        let second = locate(&coordinate, kind, &root);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(PackageError::MissingExtension { .. }), Err(PackageError::MissingExtension { .. })) => {
                prop_assert!(kind == FileKind::Other && coordinate.extension.is_none());
            }
            (a, b) => prop_assert!(false, "diverging results: {:?} / {:?}", a, b),
        }
    }

    #[test]
    fn prop_path_shape(coordinate in coordinate(), kind in kind()) {
        let root = PathBuf::from("root");
        if let Ok(path) = locate(&coordinate, kind, &root) {
            let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
            let prefix = format!("{}-{}", coordinate.artifact, coordinate.version);
            prop_assert!(file_name.starts_with(&prefix));

            let version_dir = path.parent().unwrap();
            prop_assert_eq!(version_dir.file_name().unwrap().to_string_lossy(), coordinate.version.clone());

            let mut group_dir = root.clone();
            for segment in coordinate.group.split('.') {
                group_dir.push(segment);
            }
            prop_assert!(path.starts_with(&group_dir));
        }
    }
}
