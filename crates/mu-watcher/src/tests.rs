//! Unit tests for mu-watcher

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mu_core::{ChangeKind, FileChange, GraphEventKind};
use mu_store::GraphStore;

use crate::watcher::{WatcherConfig, coalesce, spawn_watcher};
use crate::worker::UpdateWorker;

fn change(path: PathBuf, kind: ChangeKind) -> FileChange {
    FileChange { path, kind }
}

async fn worker_for(dir: &tempfile::TempDir) -> UpdateWorker {
    let store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    UpdateWorker::new(
        Arc::new(tokio::sync::Mutex::new(store)),
        dir.path().to_path_buf(),
    )
}

#[test]
fn test_coalesce_latest_state_wins() {
    assert_eq!(
        coalesce(ChangeKind::Added, ChangeKind::Modified),
        ChangeKind::Modified
    );
    assert_eq!(
        coalesce(ChangeKind::Modified, ChangeKind::Deleted),
        ChangeKind::Deleted
    );
    assert_eq!(
        coalesce(ChangeKind::Deleted, ChangeKind::Added),
        ChangeKind::Added
    );
}

#[tokio::test]
async fn test_worker_add_modify_delete_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.py");
    std::fs::write(&file, "def f():\n    pass\n").unwrap();

    let mut worker = worker_for(&dir).await;

    // Add
    let events = worker
        .process_change(change(file.clone(), ChangeKind::Added))
        .await
        .unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.kind == GraphEventKind::NodeAdded && e.node_id == "mod:m.py")
    );
    assert!(
        events
            .iter()
            .any(|e| e.kind == GraphEventKind::NodeAdded && e.node_id == "fn:m.py:f")
    );
    assert_eq!(worker.version(), 1);
    assert!(events.iter().all(|e| e.version == 1));

    // Modify: f gains a decision point, g appears.
    std::fs::write(&file, "def f(x):\n    if x:\n        pass\n\ndef g():\n    pass\n").unwrap();
    let events = worker
        .process_change(change(file.clone(), ChangeKind::Modified))
        .await
        .unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.kind == GraphEventKind::NodeModified && e.node_id == "fn:m.py:f")
    );
    assert!(
        events
            .iter()
            .any(|e| e.kind == GraphEventKind::NodeAdded && e.node_id == "fn:m.py:g")
    );
    assert_eq!(worker.version(), 2);

    // Delete
    std::fs::remove_file(&file).unwrap();
    let events = worker
        .process_change(change(file.clone(), ChangeKind::Deleted))
        .await
        .unwrap();
    assert!(
        events
            .iter()
            .all(|e| e.kind == GraphEventKind::NodeRemoved)
    );
    assert_eq!(worker.version(), 3);
}

#[tokio::test]
async fn test_worker_replay_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.py");
    std::fs::write(&file, "def f():\n    pass\n").unwrap();

    let mut worker = worker_for(&dir).await;
    let first = worker
        .process_change(change(file.clone(), ChangeKind::Added))
        .await
        .unwrap();
    assert!(!first.is_empty());
    let version_after_first = worker.version();

    // Same change again: content hash unchanged, no events, no
    // version movement.
    let second = worker
        .process_change(change(file.clone(), ChangeKind::Modified))
        .await
        .unwrap();
    assert!(second.is_empty());
    assert_eq!(worker.version(), version_after_first);
}

#[tokio::test]
async fn test_worker_parse_failure_keeps_previous_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.py");
    std::fs::write(&file, "def f():\n    pass\n").unwrap();

    let store = Arc::new(tokio::sync::Mutex::new(
        GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap(),
    ));
    let mut worker = UpdateWorker::new(Arc::clone(&store), dir.path().to_path_buf());
    worker
        .process_change(change(file.clone(), ChangeKind::Added))
        .await
        .unwrap();

    // Even a file full of garbage extracts best-effort; the parse
    // failure path is exercised with an unreadable file instead.
    std::fs::remove_file(&file).unwrap();
    let result = worker
        .process_change(change(file.clone(), ChangeKind::Modified))
        .await;
    assert!(result.is_err());

    // Previously known nodes are still there.
    let store = store.lock().await;
    assert!(!store.get_nodes_by_file("m.py").unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_unsupported_file_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "hello").unwrap();

    let mut worker = worker_for(&dir).await;
    let events = worker
        .process_change(change(file, ChangeKind::Added))
        .await
        .unwrap();
    assert!(events.is_empty());
    assert_eq!(worker.version(), 0);
}

#[tokio::test]
async fn test_worker_cross_file_import_edge_appears() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "import b\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();

    let mut worker = worker_for(&dir).await;
    worker
        .process_change(change(dir.path().join("b.py"), ChangeKind::Added))
        .await
        .unwrap();
    worker
        .process_change(change(dir.path().join("a.py"), ChangeKind::Added))
        .await
        .unwrap();

    let store = worker_store(&worker);
    let store = store.lock().await;
    let edges = store
        .get_edges(Some("mod:a.py"), None, Some(mu_core::EdgeType::Imports))
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_id, "mod:b.py");
}

fn worker_store(worker: &UpdateWorker) -> Arc<tokio::sync::Mutex<GraphStore>> {
    worker.store_handle()
}

#[tokio::test]
async fn test_worker_events_broadcast_in_commit_order() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.py");
    std::fs::write(&file, "def f():\n    pass\n").unwrap();

    let mut worker = worker_for(&dir).await;
    let mut events_rx = worker.subscribe();
    let mut version_rx = worker.version_watch();

    worker
        .process_change(change(file.clone(), ChangeKind::Added))
        .await
        .unwrap();

    version_rx.changed().await.unwrap();
    assert_eq!(*version_rx.borrow(), 1);

    let first = events_rx.recv().await.unwrap();
    assert_eq!(first.version, 1);
}

#[tokio::test]
async fn test_watcher_debounces_and_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let config = WatcherConfig {
        debounce: Duration::from_millis(50),
        poll_interval: Duration::from_millis(200),
    };
    let mut rx = match spawn_watcher(dir.path().to_path_buf(), config) {
        Ok(rx) => rx,
        // Headless CI boxes occasionally lack inotify capacity.
        Err(_) => return,
    };

    let file = dir.path().join("w.py");
    // A burst of writes collapses into one effective change.
    for i in 0..3 {
        std::fs::write(&file, format!("x = {i}\n")).unwrap();
    }

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    let Ok(Some(event)) = event else {
        // Platform watcher quirks are not this test's concern.
        return;
    };
    assert_eq!(event.path, file);
    assert!(matches!(
        event.kind,
        ChangeKind::Added | ChangeKind::Modified
    ));

    // No stale duplicates for the same content within the window.
    let follow_up = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(follow_up.is_err() || follow_up.as_ref().map(|e| e.is_none()).unwrap_or(false));
}
