//! Path containment for agent-supplied paths
//!
//! The model chooses every path it passes to a tool, so every path is
//! untrusted. [`PathSandbox::resolve`] is the single gate between those
//! strings and the filesystem.
//!
//! # Containment Rule
//!
//! ```text
//!   root        = /srv/docs
//!   "app/page"  → /srv/docs/app/page        ✓ nested under root
//!   "."         → /srv/docs                 ✓ equal to root
//!   "../etc"    → /srv/etc                  ✗ outside
//!   "../docs-x" → /srv/docs-x               ✗ outside (shares a string
//!                                              prefix, not a component)
//! ```
//!
//! Containment is checked per path component with `Path::starts_with`, never
//! with a string prefix.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path cannot be admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The path resolves outside the corpus root
    OutsideRoot(String),
    /// The path is not representable (e.g. contains a NUL byte)
    InvalidPath(String),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::OutsideRoot(path) => {
                write!(f, "Access denied: {} is outside allowed directory", path)
            }
            SandboxError::InvalidPath(path) => write!(f, "Invalid path: {:?}", path),
        }
    }
}

impl std::error::Error for SandboxError {}

/// Resolves relative paths against a fixed root
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox for `root`.
    ///
    /// The root is normalized lexically. Callers that care about symlinks
    /// should pass an already canonicalized root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the root.
    ///
    /// `.` and `..` segments are folded before the containment check, so
    /// `guide/../api` is accepted while `guide/../../etc` is not. An
    /// absolute input replaces the root entirely (as a path join does) and
    /// is therefore rejected unless it points inside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        if relative.contains('\0') {
            return Err(SandboxError::InvalidPath(relative.replace('\0', "\\0")));
        }

        let resolved = normalize(&self.root.join(relative));
        if self.contains(&resolved) {
            Ok(resolved)
        } else {
            Err(SandboxError::OutsideRoot(relative.to_string()))
        }
    }

    /// Whether `path` is the root or nested under it
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Root-relative form of `path` with `/` separators ("." for the root)
    pub fn relative(&self, path: &Path) -> String {
        relative_to(&self.root, path)
    }
}

/// `/`-separated form of `path` relative to `root` ("." for the root itself).
///
/// Paths outside `root` are returned as displayed.
pub fn relative_to(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

/// Lexically normalize a path: drop `.`, fold `..` into its parent.
///
/// `..` at the filesystem root stays at the root, matching how the OS
/// resolves `/..`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
