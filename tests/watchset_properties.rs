// tests/watchset_properties.rs

//! Property tests for reconciliation planning.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;

use watchbazel::fs::mock::MockFileSystem;
use watchbazel::fs::FileSystem;
use watchbazel::watch::watchset::{plan, WatchSet};

/// Paths of the form /ws/d<i>/f<j>, deduplicated.
fn desired_paths() -> impl Strategy<Value = Vec<PathBuf>> {
    proptest::collection::vec((0..6usize, 0..6usize), 0..24).prop_map(|pairs| {
        let mut seen = HashSet::new();
        pairs
            .into_iter()
            .filter_map(|(d, f)| {
                let path = PathBuf::from(format!("/ws/d{d}/f{f}"));
                seen.insert(path.clone()).then_some(path)
            })
            .collect()
    })
}

fn fs_with(files: &[PathBuf]) -> Arc<dyn FileSystem> {
    let fs = MockFileSystem::new();
    for file in files {
        fs.add_file(file, "x");
    }
    Arc::new(fs)
}

proptest! {
    /// Every desired file appears under exactly one planned directory add,
    /// and each directory is added at most once per pass.
    #[test]
    fn every_desired_file_is_covered_by_exactly_one_dir_add(desired in desired_paths()) {
        let fs = fs_with(&desired);
        let plan = plan(&WatchSet::new(), &desired, None, &fs);

        let mut dirs_seen = HashSet::new();
        let mut files_seen = HashSet::new();
        for add in &plan.add_dirs {
            prop_assert!(dirs_seen.insert(add.dir.clone()), "directory planned twice");
            for file in &add.files {
                prop_assert_eq!(file.parent(), Some(add.dir.as_path()));
                prop_assert!(files_seen.insert(file.clone()), "file planned twice");
            }
        }
        let desired_set: HashSet<PathBuf> = desired.iter().cloned().collect();
        prop_assert_eq!(files_seen, desired_set);
        prop_assert_eq!(plan.found, desired.len());
    }

    /// Replanning the set a pass just produced removes nothing.
    #[test]
    fn replanning_the_same_set_removes_nothing(desired in desired_paths()) {
        let fs = fs_with(&desired);
        let current: WatchSet = desired.iter().cloned().collect();
        let plan = plan(&current, &desired, None, &fs);

        prop_assert!(plan.remove_dirs.is_empty());
        prop_assert!(plan.keep.is_empty());
    }

    /// With a disjoint desired set, every previously watched parent is
    /// removed exactly once.
    #[test]
    fn disjoint_desired_set_removes_every_stale_parent(old in desired_paths()) {
        let desired = vec![PathBuf::from("/elsewhere/z/file")];
        let fs = fs_with(&desired);
        let current: WatchSet = old.iter().cloned().collect();
        let plan = plan(&current, &desired, None, &fs);

        let stale_parents: HashSet<PathBuf> = old
            .iter()
            .filter_map(|f| f.parent().map(|p| p.to_path_buf()))
            .collect();
        let removed: HashSet<PathBuf> = plan.remove_dirs.iter().cloned().collect();
        prop_assert_eq!(removed.len(), plan.remove_dirs.len(), "duplicate removals");
        prop_assert_eq!(removed, stale_parents);
    }
}
