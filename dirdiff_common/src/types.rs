use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Prefix marking a suggestion as the target of a symbolic link
pub const LINK_TARGET_PREFIX: char = '@';

/// A file recorded in a file index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the tree root, always `/`-separated
    pub relative_path: String,
    /// Literal file name
    pub base_name: String,
    /// Normalized name used to group versioned library variants
    pub canonical_name: String,
    /// Target of the symbolic link, if the entry is one
    pub link_target: Option<String>,
}

impl FileEntry {
    /// True when normalization grouped this file under another name
    pub fn has_canonical_alias(&self) -> bool {
        self.canonical_name != self.base_name
    }

    /// Link target rendered as a suggestion (`@target`)
    pub fn link_suggestion(&self) -> Option<String> {
        self.link_target
            .as_ref()
            .map(|target| format!("{}{}", LINK_TARGET_PREFIX, target))
    }
}

/// Which side(s) of a comparison a relative path exists on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    LeftOnly,
    RightOnly,
    Both,
}

impl Presence {
    pub fn from_sides(left: bool, right: bool) -> Option<Self> {
        match (left, right) {
            (true, true) => Some(Presence::Both),
            (true, false) => Some(Presence::LeftOnly),
            (false, true) => Some(Presence::RightOnly),
            (false, false) => None,
        }
    }

    /// Display flag: `L`, `R` or `LR`
    pub fn flag(&self) -> &'static str {
        match self {
            Presence::LeftOnly => "L",
            Presence::RightOnly => "R",
            Presence::Both => "LR",
        }
    }

    pub fn is_single_sided(&self) -> bool {
        !matches!(self, Presence::Both)
    }

    pub fn on_left(&self) -> bool {
        matches!(self, Presence::LeftOnly | Presence::Both)
    }

    pub fn on_right(&self) -> bool {
        matches!(self, Presence::RightOnly | Presence::Both)
    }
}

/// One name at one directory level of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub name: String,
    /// Path relative to both roots, `/`-separated
    pub relative_path: String,
    pub presence: Presence,
    pub is_directory: bool,
    /// Related names, paths and `@`-prefixed link targets
    pub suggestions: BTreeSet<String>,
    /// Child entries in sorted order; empty for files
    pub children: Vec<ComparisonEntry>,
}

impl ComparisonEntry {
    pub fn flag(&self) -> &'static str {
        self.presence.flag()
    }

    /// Suggestions joined for display
    pub fn suggestions_display(&self) -> String {
        self.suggestions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether this entry or anything below it exists on one side only
    pub fn has_differences(&self) -> bool {
        self.presence.is_single_sided() || self.children.iter().any(|c| c.has_differences())
    }

    /// Pre-order iterator over this entry and all of its descendants
    pub fn iter(&self) -> EntryIter<'_> {
        EntryIter { stack: vec![self] }
    }
}

pub struct EntryIter<'a> {
    stack: Vec<&'a ComparisonEntry>,
}

impl<'a> Iterator for EntryIter<'a> {
    type Item = &'a ComparisonEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        self.stack.extend(entry.children.iter().rev());
        Some(entry)
    }
}

/// A non-fatal problem met while walking a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Totals over a whole comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub both: usize,
    pub directories: usize,
    pub with_suggestions: usize,
}

/// Result of comparing two directory roots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub left_root: PathBuf,
    pub right_root: PathBuf,
    /// Top-level entries in sorted order
    pub entries: Vec<ComparisonEntry>,
    #[serde(default)]
    pub warnings: Vec<ScanWarning>,
}

impl ComparisonReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pre-order iterator over every entry at every level
    pub fn iter(&self) -> impl Iterator<Item = &ComparisonEntry> {
        self.entries.iter().flat_map(|entry| entry.iter())
    }

    /// Find an entry by its `/`-separated relative path
    pub fn find(&self, relative_path: &str) -> Option<&ComparisonEntry> {
        self.iter().find(|entry| entry.relative_path == relative_path)
    }

    pub fn summary(&self) -> ComparisonSummary {
        let mut summary = ComparisonSummary::default();
        for entry in self.iter() {
            summary.total += 1;
            match entry.presence {
                Presence::LeftOnly => summary.left_only += 1,
                Presence::RightOnly => summary.right_only += 1,
                Presence::Both => summary.both += 1,
            }
            if entry.is_directory {
                summary.directories += 1;
            }
            if !entry.suggestions.is_empty() {
                summary.with_suggestions += 1;
            }
        }
        summary
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Ignore patterns (e.g., "*.o", "node_modules/")
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Whether to descend into symbolic links to directories
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum walk depth below each root
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}
