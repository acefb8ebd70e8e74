//! Project registry and per-project runtime state
//!
//! Each open workspace carries exactly one writable store handle, one
//! watcher, and one update worker. Requests route to a project by
//! their optional `cwd`, walking up to the `.mu/` marker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::info;

use mu_core::workspace::{find_workspace_root, mubase_path};
use mu_core::{GraphEvent, ModuleAst, MuError};
use mu_parser::scanner::Scanner;
use mu_parser::{ParsedFile, parse_source};
use mu_store::GraphStore;
use mu_watcher::worker::WorkerHealth;
use mu_watcher::{UpdateWorker, WatcherConfig, spawn_watcher};

use crate::DaemonConfig;
use crate::cache::AlgoCache;

pub struct Project {
    pub root: PathBuf,
    pub store: Arc<tokio::sync::Mutex<GraphStore>>,
    pub events: broadcast::Sender<GraphEvent>,
    pub version: watch::Receiver<u64>,
    pub health: Arc<std::sync::Mutex<WorkerHealth>>,
    pub cache: AlgoCache,
}

impl Project {
    /// Scan, parse, build, persist, and start the live-update pipeline
    /// for one workspace root.
    pub async fn launch(root: PathBuf, config: &DaemonConfig) -> Result<Arc<Project>, MuError> {
        let started = Instant::now();
        let entries = Scanner::new(&root).scan()?;

        let mut modules: Vec<ModuleAst> = Vec::new();
        let mut hashes: HashMap<String, String> = HashMap::new();
        for entry in &entries {
            let abs = root.join(&entry.relative_path);
            let bytes = match std::fs::read(&abs) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %abs.display(), "unreadable during build: {e}");
                    continue;
                }
            };
            let parsed: ParsedFile = parse_source(&bytes, &entry.relative_path, entry.language);
            if let Some(module) = parsed.module {
                modules.push(module);
                hashes.insert(entry.relative_path.clone(), entry.content_hash.clone());
            } else if let Some(error) = parsed.error {
                tracing::warn!(path = entry.relative_path, error, "parse failed during build");
            }
        }

        let mut store = GraphStore::open(mubase_path(&root))?;
        let output = store.build(&modules, &root)?;
        info!(
            root = %root.display(),
            files = entries.len(),
            nodes = output.nodes.len(),
            edges = output.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "initial graph build complete"
        );

        let store = Arc::new(tokio::sync::Mutex::new(store));
        let mut worker = UpdateWorker::new(Arc::clone(&store), root.clone());
        worker.seed(modules, hashes);

        let health = worker.health();
        let version = worker.version_watch();

        // Re-broadcast worker events through a project-level channel
        // so subscribers survive worker restarts in tests.
        let (events_tx, _) = broadcast::channel(1024);
        let mut worker_events = worker.subscribe();
        let forward_tx = events_tx.clone();
        tokio::spawn(async move {
            loop {
                match worker_events.recv().await {
                    Ok(event) => {
                        let _ = forward_tx.send(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let watcher_config = WatcherConfig {
            debounce: Duration::from_millis(config.debounce_ms),
            ..Default::default()
        };
        let changes = spawn_watcher(root.clone(), watcher_config)?;
        tokio::spawn(worker.run(changes));

        Ok(Arc::new(Project {
            root,
            store,
            events: events_tx,
            version,
            health,
            cache: AlgoCache::new(config.cache_capacity),
        }))
    }

    pub fn current_version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Await visibility of all mutations up to `version`.
    pub async fn wait_for_version(&self, version: u64, timeout: Duration) -> Result<(), MuError> {
        let mut rx = self.version.clone();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if *rx.borrow() >= version {
                return Ok(());
            }
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| MuError::Worker(format!("timed out waiting for version {version}")))?;
            tokio::time::timeout(remaining, rx.changed())
                .await
                .map_err(|_| MuError::Worker(format!("timed out waiting for version {version}")))?
                .map_err(|_| MuError::Worker("worker stopped".to_string()))?;
        }
    }

    /// `"ok"` or `"degraded"`, from the worker's rolling failure
    /// window.
    pub fn status(&self, threshold: usize, window: Duration) -> &'static str {
        let degraded = self
            .health
            .lock()
            .map(|h| h.recent_failures(window) >= threshold)
            .unwrap_or(false);
        if degraded { "degraded" } else { "ok" }
    }
}

pub struct DaemonState {
    pub config: DaemonConfig,
    pub default_root: PathBuf,
    projects: DashMap<PathBuf, Arc<Project>>,
    pub started_at: Instant,
    pub connections: AtomicU64,
}

impl DaemonState {
    pub async fn launch(root: PathBuf, config: DaemonConfig) -> Result<Self, MuError> {
        let project = Project::launch(root.clone(), &config).await?;
        let projects = DashMap::new();
        projects.insert(root.clone(), project);
        Ok(DaemonState {
            config,
            default_root: root,
            projects,
            started_at: Instant::now(),
            connections: AtomicU64::new(0),
        })
    }

    /// Route a request to its project: the workspace containing `cwd`
    /// when given (opened lazily), the default project otherwise.
    pub async fn project_for(&self, cwd: Option<&str>) -> Result<Arc<Project>, MuError> {
        let root = match cwd {
            Some(cwd) => find_workspace_root(Path::new(cwd))
                .ok_or_else(|| MuError::NotFound(format!("no .mu workspace above {cwd}")))?,
            None => self.default_root.clone(),
        };
        if let Some(project) = self.projects.get(&root) {
            return Ok(Arc::clone(&project));
        }
        let project = Project::launch(root.clone(), &self.config).await?;
        self.projects.insert(root, Arc::clone(&project));
        Ok(project)
    }

    pub fn default_project(&self) -> Arc<Project> {
        Arc::clone(
            self.projects
                .get(&self.default_root)
                .expect("default project always registered")
                .value(),
        )
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}
