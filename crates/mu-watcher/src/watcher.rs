//! Filesystem watcher with per-path debouncing
//!
//! Raw notify events flow into a debounce task that coalesces bursts
//! on the same path into one effective change and drops events whose
//! content hash has not moved since the last delivery. When the
//! platform watcher cannot be initialized the service falls back to a
//! polling scanner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use mu_core::{ChangeKind, FileChange, Lang, MuError};
use mu_parser::scanner::{Scanner, content_hash};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Coalescing window per path.
    pub debounce: Duration,
    /// Rescan interval for the polling fallback.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            debounce: Duration::from_millis(200),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Latest-state-wins coalescing of two change kinds on one path.
pub fn coalesce(_earlier: ChangeKind, later: ChangeKind) -> ChangeKind {
    later
}

/// Start watching `root` and return the debounced change stream. Falls
/// back to polling when the platform watcher fails to initialize.
pub fn spawn_watcher(
    root: PathBuf,
    config: WatcherConfig,
) -> Result<mpsc::Receiver<FileChange>, MuError> {
    let (out_tx, out_rx) = mpsc::channel::<FileChange>(256);
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<FileChange>();

    let scanner = Scanner::new(&root);
    let watch_root = root.clone();
    let event_tx = raw_tx.clone();

    let watcher_result = notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
        match result {
            Ok(event) => forward_notify_event(event, &event_tx),
            Err(e) => error!("watch error: {e}"),
        }
    });

    match watcher_result {
        Ok(mut watcher) => {
            watcher
                .watch(&watch_root, RecursiveMode::Recursive)
                .map_err(|e| MuError::Worker(format!("watch {}: {e}", watch_root.display())))?;
            info!(root = %watch_root.display(), "watching workspace");
            // The watcher must stay alive as long as the debounce task.
            tokio::spawn(debounce_loop(watcher, raw_rx, out_tx, scanner, config.debounce));
        }
        Err(e) => {
            warn!("platform watcher unavailable ({e}), falling back to polling");
            drop(raw_tx);
            tokio::spawn(polling_loop(root, out_tx, config.poll_interval));
        }
    }

    Ok(out_rx)
}

fn forward_notify_event(event: notify::Event, tx: &mpsc::UnboundedSender<FileChange>) {
    let kind = match event.kind {
        notify::EventKind::Create(_) => ChangeKind::Added,
        notify::EventKind::Modify(_) => ChangeKind::Modified,
        notify::EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return,
    };
    for path in event.paths {
        debug!(path = %path.display(), ?kind, "raw fs event");
        if tx.send(FileChange { path, kind }).is_err() {
            return;
        }
    }
}

async fn debounce_loop(
    _watcher: notify::RecommendedWatcher,
    mut raw_rx: mpsc::UnboundedReceiver<FileChange>,
    out_tx: mpsc::Sender<FileChange>,
    scanner: Scanner,
    window: Duration,
) {
    let mut pending: HashMap<PathBuf, (ChangeKind, Instant)> = HashMap::new();
    // Hash of the last delivered content per path; unchanged content
    // drops the event.
    let mut delivered: HashMap<PathBuf, String> = HashMap::new();
    let tick = window.max(Duration::from_millis(20)) / 4;

    loop {
        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(change) = raw else { break };
                if !watchable(&scanner, &change.path) {
                    continue;
                }
                let now = Instant::now();
                pending
                    .entry(change.path.clone())
                    .and_modify(|(kind, deadline)| {
                        *kind = coalesce(*kind, change.kind);
                        *deadline = now + window;
                    })
                    .or_insert((change.kind, now + window));
            }
            _ = tokio::time::sleep(tick) => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, deadline))| *deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    let Some((kind, _)) = pending.remove(&path) else { continue };
                    if let Some(change) = finalize(&path, kind, &mut delivered) {
                        if out_tx.send(change).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    // Channel closed; flush what is left.
    let remaining: Vec<(PathBuf, ChangeKind)> =
        pending.drain().map(|(path, (kind, _))| (path, kind)).collect();
    for (path, kind) in remaining {
        if let Some(change) = finalize(&path, kind, &mut delivered) {
            let _ = out_tx.send(change).await;
        }
    }
}

fn watchable(scanner: &Scanner, path: &Path) -> bool {
    if scanner.is_ignored(path) {
        return false;
    }
    Lang::from_path(path).is_some()
}

/// Resolve the coalesced kind against the filesystem and the delivered
/// hash cache. Returns `None` when the event should be dropped.
fn finalize(
    path: &Path,
    kind: ChangeKind,
    delivered: &mut HashMap<PathBuf, String>,
) -> Option<FileChange> {
    if kind == ChangeKind::Deleted || !path.exists() {
        delivered.remove(path);
        return Some(FileChange {
            path: path.to_path_buf(),
            kind: ChangeKind::Deleted,
        });
    }
    let bytes = std::fs::read(path).ok()?;
    let hash = content_hash(&bytes);
    if delivered.get(path) == Some(&hash) {
        debug!(path = %path.display(), "content unchanged, dropping event");
        return None;
    }
    delivered.insert(path.to_path_buf(), hash);
    Some(FileChange {
        path: path.to_path_buf(),
        kind,
    })
}

/// Polling fallback: rescan on an interval and diff content hashes.
async fn polling_loop(root: PathBuf, out_tx: mpsc::Sender<FileChange>, interval: Duration) {
    let scanner = Scanner::new(&root);
    let mut known: HashMap<String, String> = match scanner.scan() {
        Ok(entries) => entries
            .into_iter()
            .map(|e| (e.relative_path, e.content_hash))
            .collect(),
        Err(e) => {
            error!("polling scan failed: {e}");
            HashMap::new()
        }
    };

    loop {
        tokio::time::sleep(interval).await;
        let entries = match scanner.scan() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("polling scan failed: {e}");
                continue;
            }
        };

        let mut current: HashMap<String, String> = HashMap::new();
        for entry in entries {
            current.insert(entry.relative_path.clone(), entry.content_hash.clone());
        }

        for (rel, hash) in &current {
            let kind = match known.get(rel) {
                None => Some(ChangeKind::Added),
                Some(old) if old != hash => Some(ChangeKind::Modified),
                Some(_) => None,
            };
            if let Some(kind) = kind {
                let change = FileChange {
                    path: root.join(rel),
                    kind,
                };
                if out_tx.send(change).await.is_err() {
                    return;
                }
            }
        }
        for rel in known.keys() {
            if !current.contains_key(rel) {
                let change = FileChange {
                    path: root.join(rel),
                    kind: ChangeKind::Deleted,
                };
                if out_tx.send(change).await.is_err() {
                    return;
                }
            }
        }
        known = current;
    }
}
