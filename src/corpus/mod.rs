//! Read-only access to the documentation corpus
//!
//! Everything the agent can see lives under one root directory that is fixed
//! at startup. Agent-supplied paths are always resolved through the
//! [`PathSandbox`] before any filesystem call is made.
//!
//! # Layers
//!
//! ```text
//! Tool call ("docs/app/routing")
//!        │
//!        ▼
//!   PathSandbox::resolve ──outside root──► CorpusError::Sandbox
//!        │
//!        ▼
//!   Corpus (list / read_range / search)
//!        │
//!        ▼
//!   DocTree (LocalTree on disk, MemoryTree in tests)
//! ```

pub mod accessor;
pub mod sandbox;
pub mod search;
pub mod snapshot;
pub mod tree;

use std::path::PathBuf;

pub use accessor::{Corpus, FileSlice};
pub use sandbox::{PathSandbox, SandboxError};
pub use search::{SearchError, SearchMatch, SearchResult};
pub use snapshot::CorpusSnapshot;
pub use tree::{DirEntry, DocTree, EntryKind, LocalTree, MemoryTree};

/// Default page size for `read_file`
pub const DEFAULT_READ_LIMIT: usize = 200;

/// Default number of matches returned by `grep`
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Matched lines longer than this are cut before being returned
pub const MAX_LINE_CHARS: usize = 200;

/// Configuration for the corpus and its inspection limits
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Directory holding the documentation tree
    pub root: PathBuf,
    /// File extensions (without the dot) treated as documents
    pub extensions: Vec<String>,
    /// Lines returned by `read_file` when no limit is given
    pub default_read_limit: usize,
    /// Upper bound for a caller-supplied `read_file` limit
    pub max_read_limit: usize,
    /// Matches returned by `grep` when no maxResults is given
    pub default_max_results: usize,
    /// Upper bound for a caller-supplied maxResults
    pub max_results_limit: usize,
    /// Maximum characters kept per matched line
    pub max_line_chars: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".next-docs"),
            extensions: vec!["md".to_string(), "mdx".to_string()],
            default_read_limit: DEFAULT_READ_LIMIT,
            max_read_limit: 1000,
            default_max_results: DEFAULT_MAX_RESULTS,
            max_results_limit: 100,
            max_line_chars: MAX_LINE_CHARS,
        }
    }
}

/// Error type for corpus operations
#[derive(Debug)]
pub enum CorpusError {
    /// The path resolved outside the corpus root
    Sandbox(SandboxError),
    /// Nothing exists at the path, or it could not be read
    NotFound(String),
    /// `list` was called on a file
    NotADirectory(String),
    /// `read_range` was called on a directory
    NotAFile(String),
    /// The search pattern did not compile
    InvalidPattern(String),
    /// The corpus root itself is unusable
    InvalidRoot(String),
}

impl std::fmt::Display for CorpusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorpusError::Sandbox(e) => write!(f, "{}", e),
            CorpusError::NotFound(path) => write!(f, "Path not found: {}", path),
            CorpusError::NotADirectory(path) => write!(f, "Not a directory: {}", path),
            CorpusError::NotAFile(path) => write!(f, "Not a file: {}", path),
            CorpusError::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            CorpusError::InvalidRoot(msg) => write!(f, "Invalid corpus root: {}", msg),
        }
    }
}

impl std::error::Error for CorpusError {}

impl From<SandboxError> for CorpusError {
    fn from(e: SandboxError) -> Self {
        CorpusError::Sandbox(e)
    }
}

impl From<SearchError> for CorpusError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::NotFound(path) => CorpusError::NotFound(path),
            SearchError::InvalidPattern(msg) => CorpusError::InvalidPattern(msg),
        }
    }
}
