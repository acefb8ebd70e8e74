//! Update worker — the single writer turning file changes into graph
//! mutations
//!
//! For each change: parse, rebuild the affected module against the
//! current module set, diff against the persisted nodes for the file,
//! and commit the whole change set in one transaction. Events are
//! broadcast in commit order, tagged with a monotonic version.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use mu_core::workspace::to_rel_path;
use mu_core::{
    ChangeKind, FileChange, GraphEvent, GraphEventKind, Lang, ModuleAst, MuError, Node, NodeType,
};
use mu_parser::parse_source;
use mu_parser::scanner::content_hash;
use mu_store::{ChangeSet, GraphBuilder, GraphStore};

/// Rolling failure window used by the daemon's degraded-mode check.
#[derive(Debug, Default)]
pub struct WorkerHealth {
    pub parse_failures: u64,
    pub store_failures: u64,
    recent: VecDeque<Instant>,
}

impl WorkerHealth {
    fn record_failure(&mut self, parse: bool) {
        if parse {
            self.parse_failures += 1;
        } else {
            self.store_failures += 1;
        }
        self.recent.push_back(Instant::now());
        while self.recent.len() > 64 {
            self.recent.pop_front();
        }
    }

    /// Failures observed within `window`.
    pub fn recent_failures(&self, window: Duration) -> usize {
        // checked_sub: the process may be younger than the window.
        match Instant::now().checked_sub(window) {
            Some(cutoff) => self.recent.iter().filter(|t| **t >= cutoff).count(),
            None => self.recent.len(),
        }
    }
}

pub struct UpdateWorker {
    store: Arc<tokio::sync::Mutex<GraphStore>>,
    root: PathBuf,
    /// Current module set, used for import resolution on re-parse.
    modules: HashMap<String, ModuleAst>,
    /// Content hash of the last processed version per file; replays
    /// with unchanged content are no-ops.
    hashes: HashMap<String, String>,
    version: u64,
    version_tx: watch::Sender<u64>,
    events_tx: broadcast::Sender<GraphEvent>,
    health: Arc<Mutex<WorkerHealth>>,
}

impl UpdateWorker {
    pub fn new(store: Arc<tokio::sync::Mutex<GraphStore>>, root: PathBuf) -> Self {
        let (version_tx, _) = watch::channel(0);
        let (events_tx, _) = broadcast::channel(1024);
        UpdateWorker {
            store,
            root,
            modules: HashMap::new(),
            hashes: HashMap::new(),
            version: 0,
            version_tx,
            events_tx,
            health: Arc::new(Mutex::new(WorkerHealth::default())),
        }
    }

    /// Prime the worker with the module set (and content hashes) of an
    /// initial build, so the first incremental change diffs correctly.
    pub fn seed(&mut self, modules: Vec<ModuleAst>, hashes: HashMap<String, String>) {
        self.modules = modules.into_iter().map(|m| (m.path.clone(), m)).collect();
        self.hashes = hashes;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events_tx.subscribe()
    }

    pub fn version_watch(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn health(&self) -> Arc<Mutex<WorkerHealth>> {
        Arc::clone(&self.health)
    }

    /// Shared handle onto the store this worker writes.
    pub fn store_handle(&self) -> Arc<tokio::sync::Mutex<GraphStore>> {
        Arc::clone(&self.store)
    }

    /// Consume the change stream until it closes. Errors are logged
    /// and never abort the loop; the next change is always processed.
    pub async fn run(mut self, mut rx: mpsc::Receiver<FileChange>) {
        info!(root = %self.root.display(), "update worker started");
        while let Some(change) = rx.recv().await {
            let path = change.path.clone();
            match self.process_change(change).await {
                Ok(events) if events.is_empty() => {}
                Ok(events) => {
                    debug!(path = %path.display(), count = events.len(), "graph events committed");
                }
                Err(e) => {
                    warn!(path = %path.display(), "change failed: {e}");
                    if let Ok(mut health) = self.health.lock() {
                        health.record_failure(false);
                    }
                }
            }
        }
        info!("update worker drained");
    }

    /// Process one change: parse → diff → commit atomically, then
    /// publish events. Public for direct driving in tests and by the
    /// daemon's post-write barrier.
    pub async fn process_change(&mut self, change: FileChange) -> Result<Vec<GraphEvent>, MuError> {
        let rel = to_rel_path(&self.root, &change.path);
        debug!(kind = ?change.kind, rel, "processing change");

        let committed = match change.kind {
            ChangeKind::Deleted => self.handle_deleted(&rel).await?,
            ChangeKind::Added | ChangeKind::Modified => {
                self.handle_changed(&change.path, &rel).await?
            }
        };
        // None: nothing was committed (unsupported file, unchanged
        // content, or parse failure). The version only moves for
        // committed change sets.
        let Some(mut events) = committed else {
            return Ok(Vec::new());
        };

        self.version += 1;
        for event in &mut events {
            event.version = self.version;
        }

        {
            let mut store = self.store.lock().await;
            for event in &events {
                store.record_history(event);
            }
        }
        let _ = self.version_tx.send(self.version);
        for event in &events {
            // Send errors just mean nobody is listening right now.
            let _ = self.events_tx.send(event.clone());
        }
        Ok(events)
    }

    async fn handle_deleted(&mut self, rel: &str) -> Result<Option<Vec<GraphEvent>>, MuError> {
        let existing = {
            let store = self.store.lock().await;
            store.get_nodes_by_file(rel)?
        };
        if existing.is_empty() {
            self.modules.remove(rel);
            self.hashes.remove(rel);
            return Ok(None);
        }

        let change = ChangeSet {
            remove_node_ids: existing.iter().map(|n| n.id.clone()).collect(),
            ..Default::default()
        };
        {
            let mut store = self.store.lock().await;
            store.apply_change_set(&change)?;
        }
        self.modules.remove(rel);
        self.hashes.remove(rel);

        info!(rel, removed = existing.len(), "file deleted");
        Ok(Some(
            existing
                .iter()
                .map(|node| {
                    GraphEvent::new(GraphEventKind::NodeRemoved, &node.id, node.node_type, rel)
                })
                .collect(),
        ))
    }

    async fn handle_changed(
        &mut self,
        abs_path: &std::path::Path,
        rel: &str,
    ) -> Result<Option<Vec<GraphEvent>>, MuError> {
        let Some(lang) = Lang::from_path(abs_path) else {
            debug!(rel, "unsupported file, skipping");
            return Ok(None);
        };

        let bytes = std::fs::read(abs_path)
            .map_err(|e| MuError::io(abs_path.display().to_string(), e))?;
        let hash = content_hash(&bytes);
        if self.hashes.get(rel) == Some(&hash) {
            debug!(rel, "content hash unchanged, skipping");
            return Ok(None);
        }

        let parsed = parse_source(&bytes, rel, lang);
        let Some(module) = parsed.module else {
            warn!(
                rel,
                error = parsed.error.as_deref().unwrap_or("unknown"),
                "parse_failed"
            );
            if let Ok(mut health) = self.health.lock() {
                health.record_failure(true);
            }
            // Previously known nodes stay pending until the file
            // parses again.
            return Ok(None);
        };

        // Rebuild against the full module set so imports and bases
        // resolve; only this file's slice of the output is applied.
        self.modules.insert(rel.to_string(), module);
        let mut all: Vec<ModuleAst> = self.modules.values().cloned().collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        let output = GraphBuilder::build(&all);

        let file_nodes: Vec<Node> = output
            .nodes
            .iter()
            .filter(|n| n.file_path == rel)
            .cloned()
            .collect();
        let file_ids: HashSet<&str> = file_nodes.iter().map(|n| n.id.as_str()).collect();
        let touched_edges: Vec<_> = output
            .edges
            .iter()
            .filter(|e| {
                file_ids.contains(e.source_id.as_str()) || file_ids.contains(e.target_id.as_str())
            })
            .cloned()
            .collect();
        // External endpoints referenced by this file's edges must
        // exist before the edges land.
        let endpoint_ids: HashSet<&str> = touched_edges
            .iter()
            .flat_map(|e| [e.source_id.as_str(), e.target_id.as_str()])
            .collect();
        let externals: Vec<Node> = output
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::External && endpoint_ids.contains(n.id.as_str()))
            .cloned()
            .collect();

        let existing = {
            let store = self.store.lock().await;
            store.get_nodes_by_file(rel)?
        };
        let existing_by_id: HashMap<&str, &Node> =
            existing.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut events = Vec::new();
        let mut upserts: Vec<Node> = Vec::new();

        for node in &file_nodes {
            match existing_by_id.get(node.id.as_str()) {
                None => {
                    upserts.push(node.clone());
                    events.push(GraphEvent::new(
                        GraphEventKind::NodeAdded,
                        &node.id,
                        node.node_type,
                        rel,
                    ));
                }
                Some(old) if !old.fingerprint_eq(node) => {
                    upserts.push(node.clone());
                    events.push(GraphEvent::new(
                        GraphEventKind::NodeModified,
                        &node.id,
                        node.node_type,
                        rel,
                    ));
                }
                Some(_) => {}
            }
        }

        let removed: Vec<&Node> = existing
            .iter()
            .filter(|n| !file_ids.contains(n.id.as_str()))
            .collect();
        for node in &removed {
            events.push(GraphEvent::new(
                GraphEventKind::NodeRemoved,
                &node.id,
                node.node_type,
                rel,
            ));
        }

        let mut clear_edges_for: Vec<String> = existing.iter().map(|n| n.id.clone()).collect();
        for id in &file_ids {
            if !existing_by_id.contains_key(*id) {
                clear_edges_for.push((*id).to_string());
            }
        }

        upserts.extend(externals);
        let change = ChangeSet {
            remove_node_ids: removed.iter().map(|n| n.id.clone()).collect(),
            upsert_nodes: upserts,
            clear_edges_for,
            insert_edges: touched_edges,
        };
        {
            let mut store = self.store.lock().await;
            store.apply_change_set(&change)?;
        }
        self.hashes.insert(rel.to_string(), hash);

        if !events.is_empty() {
            info!(
                rel,
                added = events
                    .iter()
                    .filter(|e| e.kind == GraphEventKind::NodeAdded)
                    .count(),
                modified = events
                    .iter()
                    .filter(|e| e.kind == GraphEventKind::NodeModified)
                    .count(),
                removed = events
                    .iter()
                    .filter(|e| e.kind == GraphEventKind::NodeRemoved)
                    .count(),
                "updated"
            );
        }
        Ok(Some(events))
    }
}
