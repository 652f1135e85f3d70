//! Filesystem capability used by the corpus
//!
//! The corpus never calls `std::fs` directly. It goes through [`DocTree`], which
//! has two implementations:
//!
//! - [`LocalTree`] - the real filesystem
//! - [`MemoryTree`] - an in-memory tree for tests and fixtures
//!
//! All paths handed to a `DocTree` are absolute and have already passed the
//! sandbox.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::sandbox::normalize;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Dir,
}

/// A single entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
        }
    }
}

/// Read-only view of a directory tree
pub trait DocTree: Send + Sync {
    /// Kind of the entry at `path`, following symlinks
    fn kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Entries of the directory at `path`, in no particular order.
    ///
    /// Entries whose type cannot be determined are left out.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Full UTF-8 content of the file at `path`
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Fully resolved form of `path` (symlinks followed)
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`DocTree`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTree;

impl DocTree for LocalTree {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = std::fs::metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            // Skip entries that vanish or can't be stat'ed mid-listing
            let Ok(entry) = entry else { continue };
            let Ok(kind) = self.kind(&entry.path()) else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(String),
    /// Present in listings, but every read fails with PermissionDenied
    Unreadable,
}

/// In-memory [`DocTree`]
///
/// Parent directories are created implicitly when a file is inserted.
///
/// ```
/// use docscout::corpus::{DocTree, MemoryTree};
/// use std::path::Path;
///
/// let tree = MemoryTree::new("/docs")
///     .with_file("/docs/guide/intro.md", "# Intro");
/// assert_eq!(tree.read_dir(Path::new("/docs")).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MemoryTree {
    /// Create a tree containing only the (empty) root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut tree = Self::default();
        tree.add_dir(root.as_ref());
        tree
    }

    /// Add a file with the given content
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        let path = normalize(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(path, Node::File(content.into()));
        self
    }

    /// Add an empty directory
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.add_dir(path.as_ref());
        self
    }

    /// Add a file that shows up in listings but cannot be read
    pub fn with_unreadable(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalize(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(path, Node::Unreadable);
        self
    }

    fn add_dir(&mut self, path: &Path) {
        let path = normalize(path);
        self.add_parents(&path);
        self.nodes.insert(path, Node::Dir);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            self.nodes.entry(dir.to_path_buf()).or_insert(Node::Dir);
            current = dir.parent();
        }
    }

    fn node(&self, path: &Path) -> io::Result<&Node> {
        self.nodes
            .get(&normalize(path))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

impl DocTree for MemoryTree {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        Ok(match self.node(path)? {
            Node::Dir => EntryKind::Dir,
            Node::File(_) | Node::Unreadable => EntryKind::File,
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = normalize(path);
        match self.node(&dir)? {
            Node::Dir => {}
            Node::Unreadable => {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"))
            }
            Node::File(_) => {
                return Err(io::Error::new(io::ErrorKind::Other, "not a directory"))
            }
        }

        let entries = self
            .nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(dir.as_path()))
            .filter_map(|(child, node)| {
                let name = child.file_name()?.to_string_lossy().into_owned();
                Some(match node {
                    Node::Dir => DirEntry::dir(name),
                    Node::File(_) | Node::Unreadable => DirEntry::file(name),
                })
            })
            .collect();
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.node(path)? {
            Node::File(content) => Ok(content.clone()),
            Node::Unreadable => Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable")),
            Node::Dir => Err(io::Error::new(io::ErrorKind::Other, "is a directory")),
        }
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let path = normalize(path);
        self.node(&path)?;
        Ok(path)
    }
}
