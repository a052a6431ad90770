use dirdiff_common::{AppConfig, DirDiffError, ScanWarning};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::{Parallelism, WalkDir};
use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stable index of a directory node inside one [`DirectoryTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One directory of a snapshot
///
/// Names are kept as `OsString` so every entry can be found on disk again;
/// use [`display_path`] or `to_string_lossy` for output.
#[derive(Debug, Clone)]
pub struct DirNode {
    name: OsString,
    relative_path: PathBuf,
    path: PathBuf,
    subdirs: BTreeMap<OsString, Option<NodeId>>,
    files: Vec<OsString>,
}

impl DirNode {
    /// Base name; empty for the root
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Path below the tree root; empty for the root
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Path on disk this node was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &[OsString] {
        &self.files
    }

    pub fn subdir_names(&self) -> impl Iterator<Item = &OsStr> {
        self.subdirs.keys().map(OsString::as_os_str)
    }

    /// Child node for `name`, `None` if unknown or never walked
    pub fn subdir(&self, name: &OsStr) -> Option<NodeId> {
        self.subdirs.get(name).copied().flatten()
    }

    /// Immediate file names followed by immediate subdirectory names
    pub fn listdir(&self) -> Vec<OsString> {
        self.files
            .iter()
            .cloned()
            .chain(self.subdirs.keys().cloned())
            .collect()
    }

    /// Join a child name onto this node's relative path
    pub fn child_relative_path(&self, name: &OsStr) -> PathBuf {
        self.relative_path.join(name)
    }
}

/// Immutable snapshot of one directory subtree
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root_path: PathBuf,
    nodes: Vec<DirNode>,
    warnings: Vec<ScanWarning>,
}

impl DirectoryTree {
    /// Walk `root` with default settings
    pub fn build(root: &Path) -> Result<Self, DirDiffError> {
        TreeBuilder::default().build(root)
    }

    fn empty(root: &Path) -> Self {
        Self {
            root_path: root.to_path_buf(),
            nodes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn root(&self) -> Option<&DirNode> {
        self.nodes.first()
    }

    /// Resolved child directory of `node`
    pub fn child(&self, node: &DirNode, name: &OsStr) -> Option<&DirNode> {
        node.subdir(name).and_then(|id| self.nodes.get(id.0))
    }

    /// Look a directory up by its path relative to the root
    pub fn find(&self, relative_path: impl AsRef<Path>) -> Option<&DirNode> {
        let mut node = self.root()?;
        for part in relative_path.as_ref().components() {
            node = self.child(node, part.as_os_str())?;
        }
        Some(node)
    }

    /// Pre-order traversal: every node comes before its children
    pub fn walk(&self) -> impl Iterator<Item = &DirNode> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn directory_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().map(|node| node.files.len()).sum()
    }

    /// Directories that could not be read during the walk
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }
}

#[derive(Debug, Default)]
struct RawDir {
    dirs: Vec<OsString>,
    files: Vec<OsString>,
}

/// Walks a root once and turns it into a [`DirectoryTree`]
#[derive(Default)]
pub struct TreeBuilder {
    config: AppConfig,
    custom_ignore: Option<Gitignore>,
}

impl TreeBuilder {
    pub fn new(config: AppConfig) -> Result<Self, DirDiffError> {
        let custom_ignore = Self::build_custom_ignore(&config)?;
        Ok(Self {
            config,
            custom_ignore,
        })
    }

    /// Build a Gitignore from custom ignore patterns in config
    fn build_custom_ignore(config: &AppConfig) -> Result<Option<Gitignore>, DirDiffError> {
        if config.ignore_patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &config.ignore_patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| DirDiffError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            debug!("Added custom ignore pattern: {}", pattern);
        }

        let ignore = builder
            .build()
            .map_err(|e| DirDiffError::Config(format!("Failed to build ignore rules: {}", e)))?;
        debug!("Built custom ignore with {} patterns", config.ignore_patterns.len());
        Ok(Some(ignore))
    }

    /// Walk `root` and snapshot it.
    ///
    /// A missing root gives an empty tree. Unreadable subdirectories become
    /// warnings; failing to read the root itself is an error.
    pub fn build(&self, root: &Path) -> Result<DirectoryTree, DirDiffError> {
        if !root.is_dir() {
            debug!("Root {:?} is not a directory, using an empty tree", root);
            return Ok(DirectoryTree::empty(root));
        }

        let mut raw: HashMap<PathBuf, RawDir> = HashMap::new();
        raw.insert(PathBuf::new(), RawDir::default());
        let mut problems: BTreeMap<PathBuf, String> = BTreeMap::new();

        // Serial walk: callers may already be running on the global rayon pool
        let mut walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false)
            .sort(true);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => match err.path() {
                    Some(path) if path != root => {
                        problems.entry(path.to_path_buf()).or_insert_with(|| err.to_string());
                        continue;
                    }
                    _ => {
                        return Err(DirDiffError::Walk {
                            path: root.to_path_buf(),
                            message: err.to_string(),
                        })
                    }
                },
            };

            let path = entry.path();
            if let Some(err) = &entry.read_children_error {
                if entry.depth == 0 {
                    return Err(DirDiffError::Walk {
                        path: root.to_path_buf(),
                        message: err.to_string(),
                    });
                }
                problems.entry(path.clone()).or_insert_with(|| err.to_string());
            }

            // The root itself is already seeded
            if entry.depth == 0 {
                continue;
            }

            let relative = match path.strip_prefix(root) {
                Ok(relative) => relative,
                Err(e) => {
                    debug!("Skipping {:?} outside of root: {}", path, e);
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_dir = file_type.is_dir()
                || (file_type.is_symlink() && fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false));

            if self.should_ignore_with_parents(relative, is_dir) {
                continue;
            }

            let parent_key = relative.parent().unwrap_or_else(|| Path::new(""));
            let Some(parent) = raw.get_mut(parent_key) else {
                debug!("Parent of {:?} was not recorded, skipping", relative);
                continue;
            };

            if is_dir {
                parent.dirs.push(entry.file_name.clone());
                let descended = !file_type.is_symlink() || self.config.follow_symlinks;
                let within_depth = self.config.max_depth.map_or(true, |max| entry.depth < max);
                if descended && within_depth {
                    raw.insert(relative.to_path_buf(), RawDir::default());
                }
            } else {
                parent.files.push(entry.file_name.clone());
            }
        }

        let mut warnings = Vec::with_capacity(problems.len());
        for (path, message) in problems {
            warn!("Could not read {:?}: {}", path, message);
            if let Ok(relative) = path.strip_prefix(root) {
                if !relative.as_os_str().is_empty() {
                    raw.remove(relative);
                }
            }
            warnings.push(ScanWarning { path, message });
        }

        let mut nodes = Vec::with_capacity(raw.len());
        link_node(&mut raw, &mut nodes, root, PathBuf::new(), OsString::new());

        let tree = DirectoryTree {
            root_path: root.to_path_buf(),
            nodes,
            warnings,
        };
        info!(
            "Built tree for {:?}: {} directories, {} files",
            root,
            tree.directory_count(),
            tree.file_count()
        );
        Ok(tree)
    }

    /// Check if a path or any of its parent directories should be ignored
    fn should_ignore_with_parents(&self, path: &Path, is_dir: bool) -> bool {
        if let Some(ref custom_ignore) = self.custom_ignore {
            if custom_ignore.matched(path, is_dir).is_ignore() {
                return true;
            }

            let mut current = path;
            while let Some(parent) = current.parent() {
                if !parent.as_os_str().is_empty() && custom_ignore.matched(parent, true).is_ignore() {
                    return true;
                }
                current = parent;
            }
        }
        false
    }
}

/// Move a raw directory into the arena, then link its walked children.
fn link_node(
    raw: &mut HashMap<PathBuf, RawDir>,
    nodes: &mut Vec<DirNode>,
    root: &Path,
    relative_path: PathBuf,
    name: OsString,
) -> NodeId {
    let dir = raw.remove(&relative_path).unwrap_or_default();
    let id = NodeId(nodes.len());
    let path = if relative_path.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(&relative_path)
    };

    nodes.push(DirNode {
        name,
        relative_path: relative_path.clone(),
        path,
        subdirs: BTreeMap::new(),
        files: dir.files,
    });

    for subdir in dir.dirs {
        let child_path = relative_path.join(&subdir);
        let child = if raw.contains_key(&child_path) {
            Some(link_node(raw, nodes, root, child_path, subdir.clone()))
        } else {
            None
        };
        nodes[id.0].subdirs.insert(subdir, child);
    }

    id
}

/// `/`-separated, lossily decoded form of a relative path
pub fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
