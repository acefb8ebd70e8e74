//! Advisory lock file colocated with the database
//!
//! Holding the lock prevents concurrent writers. A crash leaves a
//! stale file; it is reclaimed on the next open when the recorded pid
//! is no longer alive.

use std::path::{Path, PathBuf};

use mu_core::MuError;

pub struct LockFile {
    path: PathBuf,
    pid: u32,
}

/// `<db>.lock` next to the database file.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    // procfs where available, otherwise probe with a null signal.
    let proc_entry = Path::new("/proc").join(pid.to_string());
    if Path::new("/proc").is_dir() {
        return proc_entry.exists();
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No cheap liveness probe; treat the lock as held.
    true
}

impl LockFile {
    /// Acquire the writer lock for `db_path`, reclaiming a stale lock
    /// left behind by a dead process.
    pub fn acquire(db_path: &Path) -> Result<Self, MuError> {
        let path = lock_path(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MuError::io(parent.display().to_string(), e))?;
        }

        if path.exists() {
            let holder = std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            match holder {
                Some(pid) if pid != std::process::id() && pid_alive(pid) => {
                    return Err(MuError::Lock { pid });
                }
                Some(pid) => {
                    tracing::warn!(stale_pid = pid, lock = %path.display(), "reclaiming stale lock file");
                }
                None => {
                    tracing::warn!(lock = %path.display(), "reclaiming unreadable lock file");
                }
            }
        }

        let pid = std::process::id();
        std::fs::write(&path, pid.to_string())
            .map_err(|e| MuError::io(path.display().to_string(), e))?;
        Ok(LockFile { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Only remove a lock we still own.
        let ours = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            == Some(self.pid);
        if ours {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
