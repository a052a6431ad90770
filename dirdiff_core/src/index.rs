use crate::normalize::normalize;
use crate::tree::{display_path, DirNode, DirectoryTree};
use dirdiff_common::FileEntry;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The three bucket lists for one name
#[derive(Debug, Default)]
pub struct IndexLookup<'a> {
    /// Files with exactly this base name
    pub files: Vec<&'a FileEntry>,
    /// Files sharing this literal name anywhere in the tree
    pub cousins: Vec<&'a FileEntry>,
    /// Files whose base name or canonical name is this name
    pub similarities: Vec<&'a FileEntry>,
}

impl IndexLookup<'_> {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.cousins.is_empty() && self.similarities.is_empty()
    }
}

/// Name-based lookup tables over every file of one [`DirectoryTree`]
///
/// `by_name` and `cousins` share one store keyed by base name; they are
/// separate accessors so callers say which relation they mean.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    root_path: PathBuf,
    entries: Vec<FileEntry>,
    by_name: HashMap<String, Vec<usize>>,
    by_canonical: HashMap<String, Vec<usize>>,
    by_path: HashMap<String, usize>,
}

impl FileIndex {
    pub fn build(tree: &DirectoryTree) -> Self {
        let nodes: Vec<&DirNode> = tree.walk().collect();
        let per_dir: Vec<Vec<FileEntry>> = nodes.par_iter().map(|node| index_directory(node)).collect();

        let mut index = FileIndex {
            root_path: tree.root_path().to_path_buf(),
            ..FileIndex::default()
        };

        for entry in per_dir.into_iter().flatten() {
            let id = index.entries.len();
            index.by_name.entry(entry.base_name.clone()).or_default().push(id);
            index.by_canonical.entry(entry.base_name.clone()).or_default().push(id);
            index.by_path.insert(entry.relative_path.clone(), id);
            index.entries.push(entry);
        }

        // Canonical names only join buckets that already exist once the walk is done
        for (id, entry) in index.entries.iter().enumerate() {
            if !entry.has_canonical_alias() {
                continue;
            }
            if let Some(bucket) = index.by_canonical.get_mut(&entry.canonical_name) {
                bucket.push(id);
            }
        }

        debug!(
            "Indexed {} files ({} distinct names) under {:?}",
            index.entries.len(),
            index.by_name.len(),
            index.root_path
        );
        index
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Vec<&FileEntry> {
        self.resolve(self.by_name.get(name))
    }

    pub fn cousins(&self, name: &str) -> Vec<&FileEntry> {
        self.resolve(self.by_name.get(name))
    }

    pub fn similarities(&self, name: &str) -> Vec<&FileEntry> {
        self.resolve(self.by_canonical.get(name))
    }

    /// All three bucket lists for `name`
    pub fn get(&self, name: &str) -> IndexLookup<'_> {
        IndexLookup {
            files: self.by_name(name),
            cousins: self.cousins(name),
            similarities: self.similarities(name),
        }
    }

    /// Entry at a `/`-separated path relative to the root
    pub fn entry_at(&self, relative_path: &str) -> Option<&FileEntry> {
        self.by_path.get(relative_path).map(|&id| &self.entries[id])
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.by_canonical.keys().map(String::as_str)
    }

    fn resolve(&self, bucket: Option<&Vec<usize>>) -> Vec<&FileEntry> {
        bucket
            .map(|ids| ids.iter().map(|&id| &self.entries[id]).collect())
            .unwrap_or_default()
    }
}

fn index_directory(node: &DirNode) -> Vec<FileEntry> {
    node.files()
        .iter()
        .map(|name| {
            let full_path = node.path().join(name);
            let link_target = fs::read_link(&full_path)
                .ok()
                .map(|target| target.to_string_lossy().into_owned());
            let base_name = name.to_string_lossy().into_owned();
            // Suffix stripping only applies to names that decode cleanly
            let canonical_name = match name.to_str() {
                Some(name) => normalize(name, node.path()),
                None => base_name.clone(),
            };

            FileEntry {
                relative_path: display_path(&node.child_relative_path(name)),
                base_name,
                canonical_name,
                link_target,
            }
        })
        .collect()
}
