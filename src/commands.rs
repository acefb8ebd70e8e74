//! CLI command implementations
//!
//! Commands open the store directly: read-only for queries, with the
//! writer lock for build. Daemon-first routing belongs to the client
//! library, not this thin front-end.

use std::path::PathBuf;

use anyhow::{Context, bail};

use mu_core::workspace::{find_workspace_root, mubase_path};
use mu_core::{AlgoGraph, EdgeType, ModuleAst};
use mu_parser::parse_source;
use mu_parser::scanner::Scanner;
use mu_query::MuqlEngine;
use mu_store::GraphStore;

/// Resolve the workspace root for a starting path: an existing `.mu`
/// marker wins; otherwise the path itself becomes a new workspace.
fn resolve_root(path: &PathBuf) -> anyhow::Result<PathBuf> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve path {}", path.display()))?;
    Ok(find_workspace_root(&absolute).unwrap_or(absolute))
}

fn open_read_only(path: &PathBuf) -> anyhow::Result<(PathBuf, GraphStore)> {
    let root = resolve_root(path)?;
    let db = mubase_path(&root);
    if !db.exists() {
        bail!("no graph database at {} — run 'mu build' first", db.display());
    }
    let store = GraphStore::open_read_only(&db)?;
    Ok((root, store))
}

pub fn build(path: PathBuf) -> anyhow::Result<()> {
    let root = resolve_root(&path)?;
    tracing::info!("building graph for {}", root.display());

    let entries = Scanner::new(&root).scan()?;
    let mut modules: Vec<ModuleAst> = Vec::new();
    let mut failed = 0usize;
    for entry in &entries {
        let bytes = match std::fs::read(root.join(&entry.relative_path)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = entry.relative_path, "unreadable: {e}");
                failed += 1;
                continue;
            }
        };
        let parsed = parse_source(&bytes, &entry.relative_path, entry.language);
        match parsed.module {
            Some(module) => modules.push(module),
            None => {
                tracing::warn!(
                    path = entry.relative_path,
                    error = parsed.error.as_deref().unwrap_or("unknown"),
                    "parse failed"
                );
                failed += 1;
            }
        }
    }

    let mut store = GraphStore::open(mubase_path(&root))?;
    let output = store.build(&modules, &root)?;

    tracing::info!(
        "indexed {} files ({} failed), {} nodes, {} edges",
        entries.len(),
        failed,
        output.nodes.len(),
        output.edges.len()
    );
    Ok(())
}

pub fn query(path: PathBuf, muql: String) -> anyhow::Result<()> {
    let (_root, store) = open_read_only(&path)?;
    let result = MuqlEngine::new(&store).query(&muql);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn impact(path: PathBuf, node: String, edge_types: Vec<String>) -> anyhow::Result<()> {
    let (_root, store) = open_read_only(&path)?;
    let engine = MuqlEngine::new(&store);
    let resolved = engine.resolve_node(&node)?;

    let filter: Option<Vec<EdgeType>> = if edge_types.is_empty() {
        None
    } else {
        Some(
            edge_types
                .iter()
                .map(|t| EdgeType::parse(t).with_context(|| format!("unknown edge type: {t}")))
                .collect::<anyhow::Result<_>>()?,
        )
    };

    let graph = AlgoGraph::from_edges(store.all_edge_triples()?);
    let impacted = graph.impact(&resolved.id, filter.as_deref());
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "node": resolved.id,
            "count": impacted.len(),
            "impact": impacted,
        }))?
    );
    Ok(())
}

pub fn status(path: PathBuf) -> anyhow::Result<()> {
    let (_root, store) = open_read_only(&path)?;
    let stats = store.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn daemon(path: PathBuf, host: String, port: u16) -> anyhow::Result<()> {
    let root = resolve_root(&path)?;
    let config = mu_daemon::DaemonConfig {
        host,
        port,
        ..Default::default()
    };
    mu_daemon::serve(root, config).await
}

pub fn clear(path: PathBuf) -> anyhow::Result<()> {
    let root = resolve_root(&path)?;
    let db = mubase_path(&root);
    if db.exists() {
        std::fs::remove_file(&db)?;
        tracing::info!("removed {}", db.display());
    } else {
        tracing::info!("nothing to clear at {}", db.display());
    }
    Ok(())
}
