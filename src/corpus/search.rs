//! Recursive pattern search over the corpus
//!
//! # Algorithm
//!
//! ```text
//!   stack = [start]
//!   while let Some(node) = stack.pop():
//!       dir  → read_dir, sort by name, push children in reverse
//!              (files only if they are documents)
//!       file → scan lines, record matches
//!       stop once max_results + 1 matches have been seen
//! ```
//!
//! The cap is global for the whole walk, not per file or per directory. The
//! walk looks one match past the cap so that `truncated` is only reported
//! when something was actually left out.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::sandbox::relative_to;
use super::tree::{DocTree, EntryKind};

/// Compiled pattern size limit, bounds what a model-supplied regex can cost
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A single matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// Path relative to the corpus root, `/`-separated
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// Matched line, cut to the configured maximum length
    pub text: String,
}

/// Outcome of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    pub total_found: usize,
    pub truncated: bool,
}

/// Error type for search operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The starting path does not exist
    NotFound(String),
    /// The pattern is not a valid regular expression
    InvalidPattern(String),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::NotFound(path) => write!(f, "Path not found: {}", path),
            SearchError::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {}

/// Compile `pattern` as a case-insensitive regex
pub fn compile_pattern(pattern: &str) -> Result<Regex, SearchError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| SearchError::InvalidPattern(e.to_string()))
}

/// Limits for a single search
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_results: usize,
    pub max_line_chars: usize,
}

enum Pending {
    Dir(PathBuf),
    File(PathBuf),
}

/// Depth-first iterator over the files under a starting path.
///
/// Directories are visited in name order. Files inside directories are only
/// yielded when `accept` returns true; a file given as the starting point is
/// always yielded. Directories that cannot be read are skipped, and so is
/// anything whose resolved path leaves `root`. Each resolved directory is
/// entered once, so symlink cycles terminate.
pub struct DocumentWalk<'t, F> {
    tree: &'t dyn DocTree,
    root: PathBuf,
    stack: Vec<Pending>,
    visited: HashSet<PathBuf>,
    accept: F,
}

impl<'t, F> DocumentWalk<'t, F>
where
    F: Fn(&Path) -> bool,
{
    /// Start a walk at `start` under the resolved `root`, failing if `start`
    /// does not exist
    pub fn new(
        tree: &'t dyn DocTree,
        root: &Path,
        start: &Path,
        accept: F,
    ) -> std::io::Result<Self> {
        let first = match tree.kind(start)? {
            EntryKind::Dir => Pending::Dir(start.to_path_buf()),
            EntryKind::File => Pending::File(start.to_path_buf()),
        };
        Ok(Self {
            tree,
            root: root.to_path_buf(),
            stack: vec![first],
            visited: HashSet::new(),
            accept,
        })
    }

    /// Resolved form of `path` if it stays under the root
    fn resolve_inside(&self, path: &Path) -> Option<PathBuf> {
        let real = self.tree.canonicalize(path).ok()?;
        real.starts_with(&self.root).then_some(real)
    }
}

impl<F> Iterator for DocumentWalk<'_, F>
where
    F: Fn(&Path) -> bool,
{
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::File(path) => {
                    if self.resolve_inside(&path).is_some() {
                        return Some(path);
                    }
                }
                Pending::Dir(dir) => {
                    let Some(real) = self.resolve_inside(&dir) else {
                        continue;
                    };
                    if !self.visited.insert(real) {
                        continue;
                    }
                    let Ok(mut entries) = self.tree.read_dir(&dir) else {
                        continue;
                    };
                    entries.sort_by(|a, b| a.name.cmp(&b.name));
                    for entry in entries.into_iter().rev() {
                        let path = dir.join(&entry.name);
                        match entry.kind {
                            EntryKind::Dir => self.stack.push(Pending::Dir(path)),
                            EntryKind::File if (self.accept)(&path) => {
                                self.stack.push(Pending::File(path))
                            }
                            EntryKind::File => {}
                        }
                    }
                }
            }
        }
        None
    }
}

/// Search `start` (a file or directory under `root`) for `regex`.
///
/// `is_document` decides which files inside directories are scanned.
/// Unreadable files are skipped; only a missing `start` is an error.
pub fn search(
    tree: &dyn DocTree,
    root: &Path,
    start: &Path,
    regex: &Regex,
    limits: SearchLimits,
    is_document: impl Fn(&Path) -> bool,
) -> Result<SearchResult, SearchError> {
    let walk = DocumentWalk::new(tree, root, start, is_document)
        .map_err(|_| SearchError::NotFound(relative_to(root, start)))?;

    let mut matches = Vec::new();
    let mut truncated = false;

    'files: for file in walk {
        let Ok(content) = tree.read_to_string(&file) else {
            continue;
        };
        let rel = relative_to(root, &file);

        for (idx, line) in content.split('\n').enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if matches.len() >= limits.max_results {
                truncated = true;
                break 'files;
            }
            matches.push(SearchMatch {
                file: rel.clone(),
                line: idx + 1,
                text: truncate_chars(line.trim_end_matches('\r'), limits.max_line_chars),
            });
        }
    }

    Ok(SearchResult {
        total_found: matches.len(),
        matches,
        truncated,
    })
}

/// Keep at most `max` characters of `s`
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
