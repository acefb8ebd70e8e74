//! Unit tests for mu-daemon

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{AlgoCache, CacheKey};
use crate::lifecycle::PidFile;
use crate::project::DaemonState;
use crate::{DaemonConfig, create_router};

fn key(node: &str) -> CacheKey {
    CacheKey {
        op: "impact",
        node_id: node.to_string(),
        edge_types: String::new(),
    }
}

#[test]
fn test_cache_version_invalidation() {
    let cache = AlgoCache::new(4);
    cache.put(key("a"), 1, serde_json::json!({"n": 1}));

    assert!(cache.get(&key("a"), 1).is_some());
    // Any newer version turns the entry into a miss.
    assert!(cache.get(&key("a"), 2).is_none());
    // And the stale entry is gone.
    assert!(cache.is_empty());
}

#[test]
fn test_cache_lru_eviction() {
    let cache = AlgoCache::new(2);
    cache.put(key("a"), 1, serde_json::json!(1));
    cache.put(key("b"), 1, serde_json::json!(2));
    cache.put(key("c"), 1, serde_json::json!(3));

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&key("a"), 1).is_none());
    assert!(cache.get(&key("c"), 1).is_some());
}

#[test]
fn test_cache_distinct_edge_filters() {
    let cache = AlgoCache::new(4);
    let filtered = CacheKey {
        op: "impact",
        node_id: "a".to_string(),
        edge_types: "IMPORTS".to_string(),
    };
    cache.put(key("a"), 1, serde_json::json!("all"));
    cache.put(filtered.clone(), 1, serde_json::json!("imports"));

    assert_eq!(cache.get(&key("a"), 1), Some(serde_json::json!("all")));
    assert_eq!(cache.get(&filtered, 1), Some(serde_json::json!("imports")));
}

#[test]
fn test_pid_file_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let pid_path = {
        let pid = PidFile::write(dir.path()).unwrap();
        let path = pid.path().to_path_buf();
        assert!(path.exists());
        let recorded: u32 = std::fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(recorded, std::process::id());
        path
    };
    // Dropped on scope exit.
    assert!(!pid_path.exists());
}

#[test]
fn test_stale_pid_file_reclaimed() {
    let dir = tempfile::tempdir().unwrap();
    let path = mu_core::workspace::daemon_pid_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "999999999").unwrap();

    let pid = PidFile::write(dir.path()).unwrap();
    let recorded: u32 = std::fs::read_to_string(pid.path()).unwrap().trim().parse().unwrap();
    assert_eq!(recorded, std::process::id());
}

fn seed_workspace(dir: &tempfile::TempDir) {
    std::fs::create_dir_all(dir.path().join(".mu")).unwrap();
    std::fs::write(
        dir.path().join("a.py"),
        "import b\n\nclass Worker:\n    \"\"\"Processes jobs.\"\"\"\n    pass\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("b.py"), "class Queue:\n    pass\n").unwrap();
}

#[tokio::test]
async fn test_daemon_state_launch_and_routing() {
    let dir = tempfile::tempdir().unwrap();
    seed_workspace(&dir);

    let state = DaemonState::launch(dir.path().to_path_buf(), DaemonConfig::default())
        .await
        .unwrap();

    let project = state.default_project();
    {
        let store = project.store.lock().await;
        let stats = store.stats().unwrap();
        assert!(stats.nodes >= 4);
    }
    assert_eq!(project.current_version(), 0);
    assert_eq!(
        project.status(10, Duration::from_secs(60)),
        "ok"
    );

    // cwd routing resolves nested paths to the same project.
    let nested = dir.path().join("a.py");
    let routed = state
        .project_for(Some(nested.to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(routed.root, project.root);

    // No workspace marker above: typed not-found.
    let outside = tempfile::tempdir().unwrap();
    let missing = state
        .project_for(Some(outside.path().to_str().unwrap()))
        .await;
    assert!(matches!(missing, Err(mu_core::MuError::NotFound(_))));
}

#[tokio::test]
async fn test_router_construction() {
    let dir = tempfile::tempdir().unwrap();
    seed_workspace(&dir);

    let state = Arc::new(
        DaemonState::launch(dir.path().to_path_buf(), DaemonConfig::default())
            .await
            .unwrap(),
    );
    let _router = create_router(state);
}

#[tokio::test]
async fn test_context_assembly() {
    let dir = tempfile::tempdir().unwrap();
    seed_workspace(&dir);

    let state = DaemonState::launch(dir.path().to_path_buf(), DaemonConfig::default())
        .await
        .unwrap();
    let project = state.default_project();
    let store = project.store.lock().await;

    let assembled =
        crate::context::assemble_context(&store, "what does the Worker class do", 500).unwrap();
    assert!(assembled.nodes.iter().any(|id| id == "cls:a.py:Worker"));
    assert!(assembled.context.contains("class"));
    assert!(assembled.token_estimate <= 500);
}

#[tokio::test]
async fn test_wait_for_version_timeout() {
    let dir = tempfile::tempdir().unwrap();
    seed_workspace(&dir);

    let state = DaemonState::launch(dir.path().to_path_buf(), DaemonConfig::default())
        .await
        .unwrap();
    let project = state.default_project();

    // Version 0 is immediately visible.
    project
        .wait_for_version(0, Duration::from_millis(100))
        .await
        .unwrap();
    // A future version times out while nothing changes.
    let result = project
        .wait_for_version(99, Duration::from_millis(50))
        .await;
    assert!(result.is_err());
}
