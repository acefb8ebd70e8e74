//! MU Daemon — long-running HTTP front-end over one open graph store
//!
//! The daemon owns the single read/write store handle per project,
//! runs the watcher and update worker, serializes writes through the
//! worker, and multiplexes HTTP clients onto the query engine and
//! graph algorithms.

pub mod cache;
pub mod context;
pub mod events;
pub mod handlers;
pub mod lifecycle;
pub mod project;
pub mod router;

#[cfg(test)]
pub mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

pub use cache::AlgoCache;
pub use lifecycle::PidFile;
pub use project::{DaemonState, Project};
pub use router::create_router;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    /// Watcher coalescing window in milliseconds.
    pub debounce_ms: u64,
    /// Algorithm result cache capacity per project.
    pub cache_capacity: usize,
    /// Worker failures within the window that flip /status to
    /// "degraded".
    pub degraded_threshold: usize,
    pub degraded_window_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            host: "127.0.0.1".to_string(),
            port: 7791,
            debounce_ms: 200,
            cache_capacity: 64,
            degraded_threshold: 10,
            degraded_window_secs: 60,
        }
    }
}

/// Open the workspace at `root`, start its watcher/worker, and serve
/// HTTP until the process is stopped.
pub async fn serve(root: PathBuf, config: DaemonConfig) -> anyhow::Result<()> {
    let state = Arc::new(DaemonState::launch(root.clone(), config.clone()).await?);
    let _pid = PidFile::write(&root)?;

    let app = create_router(Arc::clone(&state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "daemon listening");
    axum::serve(listener, app).await?;
    Ok(())
}
