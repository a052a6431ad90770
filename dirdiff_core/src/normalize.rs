//! Canonical names for versioned shared-library files.
//!
//! `libfoo.so.1.2` and `libfoo-1.so` both reduce to `libfoo.so`. The reduced
//! name is only accepted when a file of that name sits in the same directory,
//! so no grouping is ever invented for a file that does not exist.

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const SO_MARKER: &str = ".so";

fn numeric_suffix() -> &'static Regex {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    NUMERIC.get_or_init(|| Regex::new(r"^\d+$").expect("valid numeric suffix regex"))
}

/// Anything that can answer "does a file with this name exist here?"
pub trait DirectoryListing {
    fn contains_name(&self, name: &str) -> bool;
}

impl DirectoryListing for [String] {
    fn contains_name(&self, name: &str) -> bool {
        self.iter().any(|entry| entry == name)
    }
}

impl DirectoryListing for Vec<String> {
    fn contains_name(&self, name: &str) -> bool {
        self.as_slice().contains_name(name)
    }
}

impl DirectoryListing for [&str] {
    fn contains_name(&self, name: &str) -> bool {
        self.iter().any(|entry| *entry == name)
    }
}

impl DirectoryListing for HashSet<String> {
    fn contains_name(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl DirectoryListing for BTreeSet<String> {
    fn contains_name(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// An on-disk directory; a name exists if `lstat` on it succeeds, so broken links count
impl DirectoryListing for Path {
    fn contains_name(&self, name: &str) -> bool {
        std::fs::symlink_metadata(self.join(name)).is_ok()
    }
}

/// Strip the trailing `so`/numeric suffix chain and re-append `.so`.
///
/// Returns `None` when the name does not carry `.so` after its first
/// character or when nothing was stripped.
pub fn canonical_candidate(base_name: &str) -> Option<String> {
    match base_name.find(SO_MARKER) {
        Some(pos) if pos > 0 => {}
        _ => return None,
    }

    let mut stem = base_name;
    loop {
        let split = stem.rfind('.').or_else(|| stem.rfind('-'));
        let Some(index) = split else { break };

        let suffix = &stem[index + 1..];
        if suffix == "so" || numeric_suffix().is_match(suffix) {
            stem = &stem[..index];
        } else {
            break;
        }
    }

    if stem == base_name {
        return None;
    }

    let mut candidate = stem.to_string();
    if !candidate.ends_with(SO_MARKER) {
        candidate.push_str(SO_MARKER);
    }
    Some(candidate)
}

/// Map a file name to its canonical form, checked against `listing`.
///
/// Falls back to `base_name` when no suffix applies or the candidate is absent.
pub fn normalize<L>(base_name: &str, listing: &L) -> String
where
    L: DirectoryListing + ?Sized,
{
    match canonical_candidate(base_name) {
        Some(candidate) if listing.contains_name(&candidate) => candidate,
        _ => base_name.to_string(),
    }
}
