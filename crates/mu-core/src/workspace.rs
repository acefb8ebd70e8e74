//! Workspace discovery and on-disk layout conventions

use std::path::{Path, PathBuf};

/// Project marker directory: `.mu/`
pub const MU_DIR: &str = ".mu";

/// Graph database file inside the marker directory.
pub const MUBASE_FILE: &str = "mubase";

/// Daemon pid file inside the marker directory.
pub const DAEMON_PID_FILE: &str = "daemon.pid";

/// Walk upward from `start` to find a directory containing a `.mu/`
/// marker. Returns the workspace root, or `None` when no marker exists
/// on the path to the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };
    loop {
        if current.join(MU_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Database path for a workspace root: `<root>/.mu/mubase`.
pub fn mubase_path(root: &Path) -> PathBuf {
    root.join(MU_DIR).join(MUBASE_FILE)
}

/// Pid file path for a workspace root: `<root>/.mu/daemon.pid`.
pub fn daemon_pid_path(root: &Path) -> PathBuf {
    root.join(MU_DIR).join(DAEMON_PID_FILE)
}

/// Workspace-relative path with forward slashes, regardless of host
/// OS. Paths outside the root are returned as given (lossy).
pub fn to_rel_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
