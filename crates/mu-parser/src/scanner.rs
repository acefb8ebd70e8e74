//! Workspace scanner
//!
//! Walks the workspace root honoring a layered ignore policy
//! (built-in defaults, `.gitignore`, optional extra globs), classifies
//! files by language, and hashes contents for content-addressed
//! caching. Single pass, deterministic lexicographic order.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use mu_core::{Lang, MuError, workspace::to_rel_path};
use sha2::{Digest, Sha256};

/// Directory names ignored regardless of gitignore contents.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".mu",
    ".venv",
    "venv",
    "__pycache__",
    "node_modules",
    "target",
    "dist",
    "build",
];

/// File glob patterns ignored by default (lockfiles, minified output).
pub const DEFAULT_IGNORED_GLOBS: &[&str] = &[
    "*.lock",
    "package-lock.json",
    "*.min.js",
    "*.min.css",
];

/// One file surviving the ignore filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Workspace-relative path with forward slashes.
    pub relative_path: String,
    pub language: Lang,
    pub size_bytes: u64,
    /// SHA-256 of the raw bytes, hex-encoded.
    pub content_hash: String,
}

/// SHA-256 of raw bytes, hex-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub struct Scanner {
    root: PathBuf,
    extra_ignores: Vec<String>,
}

impl Scanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Scanner {
            root: root.as_ref().to_path_buf(),
            extra_ignores: Vec::new(),
        }
    }

    /// Additional ignore globs from project configuration.
    pub fn with_ignores(mut self, globs: Vec<String>) -> Self {
        self.extra_ignores = globs;
        self
    }

    fn glob_set(&self) -> Result<GlobSet, MuError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORED_GLOBS
            .iter()
            .map(|s| s.to_string())
            .chain(self.extra_ignores.iter().cloned())
        {
            let glob = Glob::new(&pattern).map_err(|e| MuError::Scan {
                path: pattern.clone(),
                kind: format!("bad ignore glob: {e}"),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| MuError::Scan {
            path: self.root.display().to_string(),
            kind: format!("ignore set: {e}"),
        })
    }

    /// Walk the workspace and return entries for every recognized
    /// source file, sorted by relative path.
    pub fn scan(&self) -> Result<Vec<ScanEntry>, MuError> {
        if !self.root.is_dir() {
            return Err(MuError::Scan {
                path: self.root.display().to_string(),
                kind: "root does not exist or is not a directory".to_string(),
            });
        }
        let globs = self.glob_set()?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && DEFAULT_IGNORED_DIRS.contains(&name.as_ref()))
            })
            .build();

        let mut entries = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("scan: skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(language) = Lang::from_path(path) else {
                continue;
            };
            let rel = to_rel_path(&self.root, path);
            if globs.is_match(&rel) || globs.is_match(entry.file_name()) {
                continue;
            }
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "scan: unreadable file: {e}");
                    continue;
                }
            };
            entries.push(ScanEntry {
                relative_path: rel,
                language,
                size_bytes: bytes.len() as u64,
                content_hash: content_hash(&bytes),
            });
        }

        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(entries)
    }

    /// True when the scanner's ignore policy excludes this path.
    pub fn is_ignored(&self, path: &Path) -> bool {
        for component in path.components() {
            let name = component.as_os_str().to_string_lossy();
            if DEFAULT_IGNORED_DIRS.contains(&name.as_ref()) {
                return true;
            }
        }
        if let Ok(globs) = self.glob_set() {
            let rel = to_rel_path(&self.root, path);
            if globs.is_match(&rel) {
                return true;
            }
            if let Some(name) = path.file_name() {
                if globs.is_match(name) {
                    return true;
                }
            }
        }
        false
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
