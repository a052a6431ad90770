use crate::index::FileIndex;
use crate::tree::{display_path, DirNode, DirectoryTree, TreeBuilder};
use dirdiff_common::{AppConfig, ComparisonEntry, ComparisonReport, DirDiffError, Presence};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A scanned root: its directory tree and the file index built from it
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tree: DirectoryTree,
    pub index: FileIndex,
}

impl Snapshot {
    pub fn scan(builder: &TreeBuilder, root: &Path) -> Result<Self, DirDiffError> {
        let tree = builder.build(root)?;
        let index = FileIndex::build(&tree);
        Ok(Self { tree, index })
    }

    pub fn root_path(&self) -> &Path {
        self.tree.root_path()
    }

    fn path_of(&self, relative_path: &Path) -> PathBuf {
        self.root_path().join(relative_path)
    }
}

/// Walks two snapshots in lock-step and tags every name with its presence
pub struct ComparisonEngine {
    builder: TreeBuilder,
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self {
            builder: TreeBuilder::default(),
        }
    }
}

impl ComparisonEngine {
    pub fn new(config: AppConfig) -> Result<Self, DirDiffError> {
        Ok(Self {
            builder: TreeBuilder::new(config)?,
        })
    }

    /// Scan both roots, then compare them
    ///
    /// The two sides are scanned in parallel; comparison starts once both are indexed.
    pub fn compare(&self, left_root: &Path, right_root: &Path) -> Result<ComparisonReport, DirDiffError> {
        info!("Comparing {:?} with {:?}", left_root, right_root);
        let (left, right) = rayon::join(
            || Snapshot::scan(&self.builder, left_root),
            || Snapshot::scan(&self.builder, right_root),
        );
        Ok(self.compare_snapshots(&left?, &right?))
    }

    pub fn compare_snapshots(&self, left: &Snapshot, right: &Snapshot) -> ComparisonReport {
        let entries = self.compare_directory(left, right, left.tree.root(), right.tree.root(), Path::new(""));

        let warnings = left
            .tree
            .warnings()
            .iter()
            .chain(right.tree.warnings())
            .cloned()
            .collect();

        let report = ComparisonReport {
            left_root: left.root_path().to_path_buf(),
            right_root: right.root_path().to_path_buf(),
            entries,
            warnings,
        };
        let summary = report.summary();
        info!(
            "Compared {} entries: {} left only, {} right only, {} on both sides",
            summary.total, summary.left_only, summary.right_only, summary.both
        );
        report
    }

    /// Compare one directory level and everything below it.
    ///
    /// Either node may be absent when the directory only exists on one side
    /// or could not be walked. Entries come back sorted by name.
    pub fn compare_directory(
        &self,
        left: &Snapshot,
        right: &Snapshot,
        left_node: Option<&DirNode>,
        right_node: Option<&DirNode>,
        relative_dir: &Path,
    ) -> Vec<ComparisonEntry> {
        let names: BTreeSet<OsString> = left_node
            .map(DirNode::listdir)
            .unwrap_or_default()
            .into_iter()
            .chain(right_node.map(DirNode::listdir).unwrap_or_default())
            .collect();

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let relative = relative_dir.join(&name);
            let left_path = left.path_of(&relative);
            let right_path = right.path_of(&relative);
            let display_name = name.to_string_lossy().into_owned();
            let relative_path = display_path(&relative);

            let Some(presence) = Presence::from_sides(path_exists(&left_path), path_exists(&right_path)) else {
                warn!("{} vanished from both sides during comparison", relative_path);
                continue;
            };

            if is_directory(&left_path) || is_directory(&right_path) {
                let children = self.compare_directory(
                    left,
                    right,
                    left_node.and_then(|node| left.tree.child(node, &name)),
                    right_node.and_then(|node| right.tree.child(node, &name)),
                    &relative,
                );
                entries.push(ComparisonEntry {
                    name: display_name,
                    relative_path,
                    presence,
                    is_directory: true,
                    suggestions: BTreeSet::new(),
                    children,
                });
                continue;
            }

            let mut suggestions = suggest(left, right, presence, &display_name, &relative_path);

            let mut excluded: BTreeSet<String> = BTreeSet::new();
            excluded.insert(display_name.clone());
            for node in [left_node, right_node].into_iter().flatten() {
                excluded.insert(display_path(&node.child_relative_path(&name)));
            }
            if presence.is_single_sided() {
                excluded.insert(relative_path.clone());
            }
            suggestions.retain(|candidate| !excluded.contains(candidate));

            entries.push(ComparisonEntry {
                name: display_name,
                relative_path,
                presence,
                is_directory: false,
                suggestions,
                children: Vec::new(),
            });
        }

        entries
    }
}

/// Candidate related names for a file at `relative_path`, before exclusions
fn suggest(
    left: &Snapshot,
    right: &Snapshot,
    presence: Presence,
    name: &str,
    relative_path: &str,
) -> BTreeSet<String> {
    let mut candidates = BTreeSet::new();

    // Every same-named file on a side the name is present on contributes its link target
    if presence.on_left() {
        candidates.extend(left.index.by_name(name).into_iter().filter_map(|f| f.link_suggestion()));
    }
    if presence.on_right() {
        candidates.extend(right.index.by_name(name).into_iter().filter_map(|f| f.link_suggestion()));
    }

    let (own, other) = match presence {
        Presence::Both => return candidates,
        Presence::LeftOnly => (left, right),
        Presence::RightOnly => (right, left),
    };

    let lookup = other.index.get(name);
    for file in &lookup.files {
        if file.has_canonical_alias() {
            candidates.insert(file.canonical_name.clone());
        }
        candidates.extend(file.link_suggestion());
    }
    candidates.extend(lookup.cousins.iter().map(|f| f.relative_path.clone()));
    candidates.extend(lookup.similarities.iter().map(|f| f.relative_path.clone()));

    // A versioned file whose canonical form exists on the other side
    if let Some(own_entry) = own.index.entry_at(relative_path) {
        if own_entry.has_canonical_alias() {
            let canonical = &own_entry.canonical_name;
            if other.index.contains_name(canonical) {
                candidates.insert(canonical.clone());
            }
            candidates.extend(
                other
                    .index
                    .similarities(canonical)
                    .into_iter()
                    .map(|f| f.relative_path.clone()),
            );
        }
    }

    candidates
}

fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Roots {
        _temp: TempDir,
        left: PathBuf,
        right: PathBuf,
    }

    fn roots(left_files: &[&str], right_files: &[&str]) -> Roots {
        let temp = TempDir::new().unwrap();
        let left = temp.path().join("left");
        let right = temp.path().join("right");
        for (root, files) in [(&left, left_files), (&right, right_files)] {
            fs::create_dir_all(root).unwrap();
            for file in files {
                let path = root.join(file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, file.as_bytes()).unwrap();
            }
        }
        Roots {
            _temp: temp,
            left,
            right,
        }
    }

    fn names(entries: &[ComparisonEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_presence_per_file() {
        let r = roots(&["a/x.txt", "a/y.txt"], &["a/x.txt", "a/z.txt"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        assert_eq!(report.entries.len(), 1);
        let a = &report.entries[0];
        assert_eq!(a.name, "a");
        assert!(a.is_directory);
        assert_eq!(a.presence, Presence::Both);
        assert!(a.suggestions.is_empty());

        assert_eq!(names(&a.children), vec!["x.txt", "y.txt", "z.txt"]);
        assert_eq!(a.children[0].presence, Presence::Both);
        assert_eq!(a.children[1].presence, Presence::LeftOnly);
        assert_eq!(a.children[2].presence, Presence::RightOnly);
        assert_eq!(a.children[1].relative_path, "a/y.txt");
        assert_eq!(a.children[1].flag(), "L");
        assert_eq!(a.children[2].flag(), "R");
        assert_eq!(a.children[0].flag(), "LR");
    }

    #[test]
    fn test_directories_and_files_interleave_in_case_sensitive_order() {
        let r = roots(&["B.txt", "a/1", "c.txt"], &["Z/2", "b.txt"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        assert_eq!(names(&report.entries), vec!["B.txt", "Z", "a", "b.txt", "c.txt"]);
        assert!(report.entries[1].is_directory);
        assert_eq!(report.entries[1].presence, Presence::RightOnly);
        assert_eq!(names(&report.entries[1].children), vec!["2"]);
        assert_eq!(report.entries[1].children[0].presence, Presence::RightOnly);
    }

    #[test]
    fn test_versioned_library_suggests_canonical_counterpart() {
        let r = roots(&["lib/libfoo.so.1", "lib/libfoo.so"], &["lib/libfoo.so"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        let versioned = report.find("lib/libfoo.so.1").expect("versioned entry");
        assert_eq!(versioned.presence, Presence::LeftOnly);
        assert!(versioned.suggestions.contains("libfoo.so"), "{:?}", versioned.suggestions);
        assert!(!versioned.suggestions.contains("libfoo.so.1"));
        assert!(!versioned.suggestions.contains("lib/libfoo.so.1"));

        let plain = report.find("lib/libfoo.so").unwrap();
        assert_eq!(plain.presence, Presence::Both);
        assert!(plain.suggestions.is_empty());
    }

    #[test]
    fn test_cousins_elsewhere_on_other_side() {
        let r = roots(&["old/config.ini"], &["new/config.ini"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        let moved = report.find("old/config.ini").unwrap();
        assert_eq!(moved.presence, Presence::LeftOnly);
        assert_eq!(moved.suggestions_display(), "new/config.ini");

        let added = report.find("new/config.ini").unwrap();
        assert_eq!(added.presence, Presence::RightOnly);
        assert_eq!(added.suggestions_display(), "old/config.ini");
    }

    #[test]
    fn test_other_side_variant_exposes_its_canonical_name() {
        let r = roots(&["libz.so.1"], &["pkg/libz.so", "pkg/libz.so.1"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        let entry = report.find("libz.so.1").unwrap();
        assert_eq!(entry.presence, Presence::LeftOnly);
        assert!(entry.suggestions.contains("libz.so"));
        assert!(entry.suggestions.contains("pkg/libz.so.1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_single_sided_symlink_surfaces_target() {
        let r = roots(&[], &["target.bin"]);
        std::os::unix::fs::symlink("target.bin", r.right.join("link")).unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        let link = report.find("link").unwrap();
        assert_eq!(link.presence, Presence::RightOnly);
        assert!(!link.is_directory);
        assert!(link.suggestions.contains("@target.bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_targets_collected_when_present_on_both_sides() {
        let r = roots(&["tool"], &["tool-2.0"]);
        std::os::unix::fs::symlink("tool-2.0", r.right.join("tool")).unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        let tool = report.find("tool").unwrap();
        assert_eq!(tool.presence, Presence::Both);
        assert_eq!(tool.suggestions_display(), "@tool-2.0");
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_still_suggested() {
        let r = roots(&[], &[]);
        std::os::unix::fs::symlink("missing", r.left.join("dangling")).unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        let dangling = report.find("dangling").unwrap();
        assert_eq!(dangling.presence, Presence::LeftOnly);
        assert!(dangling.suggestions.contains("@missing"));
    }

    #[test]
    fn test_missing_roots_give_empty_report() {
        let temp = TempDir::new().unwrap();
        let report = ComparisonEngine::default()
            .compare(&temp.path().join("nope-left"), &temp.path().join("nope-right"))
            .unwrap();
        assert!(report.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_one_missing_root_lists_other_side() {
        let r = roots(&["a/x.txt", "b.txt"], &[]);
        fs::remove_dir(&r.right).unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        assert_eq!(names(&report.entries), vec!["a", "b.txt"]);
        assert!(report.iter().all(|e| e.presence == Presence::LeftOnly));
        assert_eq!(report.summary().left_only, 3);
    }

    #[test]
    fn test_file_against_directory_recurses() {
        let r = roots(&["item"], &["item/inner.txt"]);
        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();

        let item = report.find("item").unwrap();
        assert!(item.is_directory);
        assert_eq!(item.presence, Presence::Both);
        assert_eq!(names(&item.children), vec!["inner.txt"]);
        assert_eq!(item.children[0].presence, Presence::RightOnly);
    }

    #[test]
    fn test_ignore_patterns_apply_to_both_sides() {
        let r = roots(&["keep.txt", "drop.log"], &["keep.txt", "other.log"]);
        let config = AppConfig {
            ignore_patterns: vec!["*.log".to_string()],
            ..AppConfig::default()
        };
        let report = ComparisonEngine::new(config).unwrap().compare(&r.left, &r.right).unwrap();
        assert_eq!(names(&report.entries), vec!["keep.txt"]);
    }

    #[test]
    fn test_compare_directory_with_absent_nodes() {
        let r = roots(&["only/left.txt"], &[]);
        let builder = TreeBuilder::default();
        let left = Snapshot::scan(&builder, &r.left).unwrap();
        let right = Snapshot::scan(&builder, &r.right).unwrap();
        let engine = ComparisonEngine::default();

        let only = left.tree.find("only");
        let entries = engine.compare_directory(&left, &right, only, None, Path::new("only"));
        assert_eq!(names(&entries), vec!["left.txt"]);
        assert_eq!(entries[0].relative_path, "only/left.txt");
        assert_eq!(entries[0].presence, Presence::LeftOnly);

        assert!(engine.compare_directory(&left, &right, None, None, Path::new("")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_targets_of_every_same_named_file_on_present_side() {
        let r = roots(&[], &["a/.keep", "b/.keep"]);
        std::os::unix::fs::symlink("t1", r.right.join("a/link")).unwrap();
        std::os::unix::fs::symlink("t2", r.right.join("b/link")).unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        for path in ["a/link", "b/link"] {
            let link = report.find(path).unwrap();
            assert_eq!(link.presence, Presence::RightOnly);
            assert!(link.suggestions.contains("@t1"), "{path}: {:?}", link.suggestions);
            assert!(link.suggestions.contains("@t2"), "{path}: {:?}", link.suggestions);
        }
    }

    #[test]
    fn test_compare_inside_small_thread_pools() {
        let files: Vec<String> = (0..6)
            .flat_map(|d| (0..10).map(move |f| format!("dir_{d}/file_{f}.txt")))
            .collect();
        let files: Vec<&str> = files.iter().map(String::as_str).collect();
        let r = roots(&files, &files);

        for threads in [1, 2] {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            let report = pool
                .install(|| ComparisonEngine::default().compare(&r.left, &r.right))
                .unwrap();

            let summary = report.summary();
            assert_eq!(summary.total, 66, "{threads} threads");
            assert_eq!(summary.both, summary.total);
            assert_eq!(summary.directories, 6);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_names_are_compared() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let r = roots(&["menu.txt"], &["menu.txt"]);
        fs::write(r.left.join(OsStr::from_bytes(b"caf\xe9.txt")), b"").unwrap();

        let report = ComparisonEngine::default().compare(&r.left, &r.right).unwrap();
        assert_eq!(report.entries.len(), 2);
        let odd = report.entries.iter().find(|e| e.name != "menu.txt").unwrap();
        assert_eq!(odd.presence, Presence::LeftOnly);
        assert!(!odd.is_directory);
    }
}
