//! Daemon pid file
//!
//! Written on start, removed on clean shutdown. A stale file (dead
//! pid) left by a crash is cleaned up on the next start.

use std::path::{Path, PathBuf};

use mu_core::MuError;
use mu_core::workspace::daemon_pid_path;

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn write(root: &Path) -> Result<Self, MuError> {
        let path = daemon_pid_path(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MuError::io(parent.display().to_string(), e))?;
        }

        if let Some(existing) = read_pid(&path) {
            if existing != std::process::id() && pid_alive(existing) {
                return Err(MuError::DaemonUnavailable(format!(
                    "daemon already running with pid {existing}"
                )));
            }
            tracing::warn!(stale_pid = existing, "removing stale daemon pid file");
        }

        std::fs::write(&path, std::process::id().to_string())
            .map_err(|e| MuError::io(path.display().to_string(), e))?;
        Ok(PidFile { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(std::process::id()) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
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
    true
}
