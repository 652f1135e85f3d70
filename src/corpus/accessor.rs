//! Corpus accessor: list, read and search under a fixed root

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::sandbox::PathSandbox;
use super::search::{self, SearchLimits, SearchResult};
use super::tree::{DirEntry, DocTree, EntryKind, LocalTree};
use super::{CorpusConfig, CorpusError};
use crate::corpus::SandboxError;

/// A page of lines read from a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSlice {
    /// The requested lines joined with `\n`
    pub content: String,
    /// Number of lines in the whole file
    pub total_lines: usize,
    /// Human-readable range, e.g. "lines 1-200 of 512"
    pub showing: String,
}

/// Read-only view of the documentation tree
///
/// Every public operation takes a root-relative path and runs it through the
/// sandbox before touching the tree.
pub struct Corpus {
    sandbox: PathSandbox,
    tree: Box<dyn DocTree>,
    extensions: Vec<String>,
    max_line_chars: usize,
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("root", &self.sandbox.root())
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Corpus {
    /// Open the corpus on the local filesystem.
    ///
    /// The root is canonicalized once here so that symlink checks later on
    /// compare like with like.
    pub fn open(config: &CorpusConfig) -> Result<Self, CorpusError> {
        let root = std::fs::canonicalize(&config.root).map_err(|e| {
            CorpusError::InvalidRoot(format!("{}: {}", config.root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(CorpusError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self::with_tree(root, LocalTree, config))
    }

    /// Build a corpus over any [`DocTree`] rooted at `root`
    pub fn with_tree(
        root: impl AsRef<Path>,
        tree: impl DocTree + 'static,
        config: &CorpusConfig,
    ) -> Self {
        Self {
            sandbox: PathSandbox::new(root),
            tree: Box::new(tree),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_line_chars: config.max_line_chars,
        }
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn tree(&self) -> &dyn DocTree {
        self.tree.as_ref()
    }

    /// Whether `path` has one of the document extensions
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .map(|ext| self.extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }

    /// Root-relative `/`-separated display form of an absolute path
    pub fn relative(&self, path: &Path) -> String {
        self.sandbox.relative(path)
    }

    /// Resolve an agent-supplied path to an absolute path inside the root.
    ///
    /// After the lexical check, the target (or, when it is missing, its
    /// deepest existing ancestor) is canonicalized and checked again, which
    /// catches symlinks pointing out of the tree.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, CorpusError> {
        let resolved = self.sandbox.resolve(relative)?;
        match self.tree.canonicalize(&resolved) {
            Ok(real) if self.sandbox.contains(&real) => Ok(real),
            Ok(real) => {
                debug!(path = relative, target = %real.display(), "Symlink escapes corpus root");
                Err(SandboxError::OutsideRoot(relative.to_string()).into())
            }
            // Missing target: its deepest existing ancestor must stay inside,
            // otherwise a link out of the root would reveal what exists beyond it
            Err(_) => {
                let mut ancestor = resolved.parent();
                while let Some(dir) = ancestor {
                    if let Ok(real) = self.tree.canonicalize(dir) {
                        if !self.sandbox.contains(&real) {
                            debug!(
                                path = relative,
                                target = %real.display(),
                                "Symlink escapes corpus root"
                            );
                            return Err(SandboxError::OutsideRoot(relative.to_string()).into());
                        }
                        break;
                    }
                    ancestor = dir.parent();
                }
                Ok(resolved)
            }
        }
    }

    /// List a directory, sorted by name
    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>, CorpusError> {
        let dir = self.resolve(path)?;
        match self.tree.kind(&dir) {
            Ok(EntryKind::Dir) => {}
            Ok(EntryKind::File) => return Err(CorpusError::NotADirectory(path.to_string())),
            Err(_) => return Err(CorpusError::NotFound(path.to_string())),
        }

        let mut entries = self
            .tree
            .read_dir(&dir)
            .map_err(|e| not_found(path, e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Read lines `[offset, offset + limit)` of a file.
    ///
    /// Offsets past the end give an empty slice rather than an error.
    pub fn read_range(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<FileSlice, CorpusError> {
        let file = self.resolve(path)?;
        if let Ok(EntryKind::Dir) = self.tree.kind(&file) {
            return Err(CorpusError::NotAFile(path.to_string()));
        }

        let text = self
            .tree
            .read_to_string(&file)
            .map_err(|e| not_found(path, e))?;
        Ok(slice_lines(&text, offset, limit))
    }

    /// Case-insensitive regex search under `path`
    pub fn search(
        &self,
        path: &str,
        pattern: &str,
        max_results: usize,
    ) -> Result<SearchResult, CorpusError> {
        let regex = search::compile_pattern(pattern)?;
        let start = self.resolve(path)?;
        let limits = SearchLimits {
            max_results,
            max_line_chars: self.max_line_chars,
        };
        let result = search::search(
            self.tree(),
            self.root(),
            &start,
            &regex,
            limits,
            |p| self.is_document(p),
        )
        .map_err(|e| match e {
            search::SearchError::NotFound(_) => CorpusError::NotFound(path.to_string()),
            other => other.into(),
        })?;
        Ok(result)
    }
}

fn not_found(path: &str, e: io::Error) -> CorpusError {
    debug!(path, error = %e, "Corpus read failed");
    CorpusError::NotFound(path.to_string())
}

/// Cut a page of lines out of `text`
fn slice_lines(text: &str, offset: usize, limit: usize) -> FileSlice {
    let lines: Vec<&str> = text.split('\n').collect();
    let total = lines.len();
    let start = offset.min(total);
    let end = offset.saturating_add(limit).min(total);

    if start >= end {
        return FileSlice {
            content: String::new(),
            total_lines: total,
            showing: format!("lines {}-{} of {}", total, total, total),
        };
    }

    FileSlice {
        content: lines[start..end].join("\n"),
        total_lines: total,
        showing: format!("lines {}-{} of {}", start + 1, end, total),
    }
}
