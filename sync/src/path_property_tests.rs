//! Property tests for mapping changed paths between roots

use std::path::{Path, PathBuf};
use proptest::prelude::*;

use crate::error::SyncError;
use crate::event::{ChangeKind, LogEntry, Route, Side};
use crate::options::SyncMode;
use crate::sync_engine::mirror_path;

/// Strategy for generating valid file names
pub fn valid_file_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_\\-][a-zA-Z0-9_\\-\\.]{0,40}"
}

/// Strategy for generating valid directory names
pub fn valid_dir_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_\\-]{1,30}"
}

/// Strategy for generating non-empty relative paths
pub fn relative_path() -> impl Strategy<Value = PathBuf> {
    (prop::collection::vec(valid_dir_name(), 0..6), valid_file_name()).prop_map(|(dirs, name)| {
        let mut path = PathBuf::new();
        for dir in dirs {
            path.push(dir);
        }
        path.push(name);
        path
    })
}

/// Strategy for generating absolute roots (Unix-style)
pub fn absolute_root() -> impl Strategy<Value = PathBuf> {
    prop::collection::vec(valid_dir_name(), 1..4).prop_map(|dirs| {
        let mut root = PathBuf::from("/");
        for dir in dirs {
            root.push(dir);
        }
        root
    })
}

proptest! {
    #[test]
    fn test_destination_is_target_joined_with_relative(
        from_root in absolute_root(),
        to_root in absolute_root(),
        relative in relative_path(),
    ) {
        let changed = from_root.join(&relative);
        let (mapped, destination) = mirror_path(&from_root, &to_root, &changed).unwrap();

        prop_assert_eq!(&mapped, &relative);
        prop_assert_eq!(&destination, &to_root.join(&relative));
        prop_assert!(destination.starts_with(&to_root));
    }

    #[test]
    fn test_mapping_back_returns_original_path(
        from_root in absolute_root(),
        to_root in absolute_root(),
        relative in relative_path(),
    ) {
        prop_assume!(!from_root.starts_with(&to_root) && !to_root.starts_with(&from_root));

        let changed = from_root.join(&relative);
        let (_, destination) = mirror_path(&from_root, &to_root, &changed).unwrap();
        let (back_relative, back) = mirror_path(&to_root, &from_root, &destination).unwrap();

        prop_assert_eq!(back_relative, relative);
        prop_assert_eq!(back, changed);
    }

    #[test]
    fn test_paths_outside_root_are_rejected(
        from_root in absolute_root(),
        other_root in absolute_root(),
        relative in relative_path(),
    ) {
        let changed = other_root.join(&relative);
        prop_assume!(!changed.starts_with(&from_root));

        let result = mirror_path(&from_root, Path::new("/target"), &changed);
        let is_path_error = matches!(result, Err(SyncError::Path { .. }));
        prop_assert!(is_path_error);
    }

    #[test]
    fn test_log_entry_path_is_relative_to_origin(
        from_root in absolute_root(),
        to_root in absolute_root(),
        relative in relative_path(),
    ) {
        let changed = from_root.join(&relative);
        let (mapped, destination) = mirror_path(&from_root, &to_root, &changed).unwrap();
        let route = Route {
            origin: Side::Target,
            mode: SyncMode::TwoWay,
            from_root: from_root.clone(),
            to_root: to_root.clone(),
            relative: mapped,
            destination,
        };
        let entry = LogEntry::mirrored(ChangeKind::Change, &route);

        prop_assert!(entry.path.is_relative());
        prop_assert_eq!(from_root.join(&entry.path), changed);
        prop_assert_eq!(entry.from_dir, from_root);
    }
}

#[test]
fn test_root_itself_is_not_mappable() {
    let result = mirror_path(Path::new("/a"), Path::new("/b"), Path::new("/a"));
    assert!(matches!(result, Err(SyncError::Path { .. })));
}

#[test]
fn test_sibling_prefix_is_not_inside_root() {
    // "/data2" shares a string prefix with "/data" but is a different directory
    let result = mirror_path(Path::new("/data"), Path::new("/b"), Path::new("/data2/x.txt"));
    assert!(result.is_err());
}
