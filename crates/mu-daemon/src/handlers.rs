//! REST handlers and error mapping

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use mu_core::{EdgeType, MuError};
use mu_query::{MuqlEngine, QueryError};

use crate::cache::CacheKey;
use crate::context::assemble_context;
use crate::project::DaemonState;

/// Wire error envelope: `{error: {kind, message}}` with the HTTP
/// status the kind maps onto.
pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "kind": self.kind, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<MuError> for ApiError {
    fn from(e: MuError) -> Self {
        let status = match &e {
            MuError::NotFound(_) => StatusCode::NOT_FOUND,
            MuError::Lock { .. } => StatusCode::CONFLICT,
            MuError::Worker(_) => StatusCode::SERVICE_UNAVAILABLE,
            MuError::UnsupportedLanguage(_) | MuError::Parse { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.kind(), e.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match &e {
            QueryError::Syntax { .. } | QueryError::UnknownColumn(_) => StatusCode::BAD_REQUEST,
            QueryError::UnknownTable(_) | QueryError::UnresolvedNode(_) => StatusCode::NOT_FOUND,
            QueryError::Timeout | QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.kind(), e.to_string())
    }
}

fn parse_edge_types(tags: &Option<Vec<String>>) -> Result<Option<Vec<EdgeType>>, ApiError> {
    let Some(tags) = tags else {
        return Ok(None);
    };
    let mut types = Vec::new();
    for tag in tags {
        let parsed = EdgeType::parse(tag)
            .ok_or_else(|| ApiError::bad_request(format!("unknown edge type: {tag}")))?;
        types.push(parsed);
    }
    Ok(if types.is_empty() { None } else { Some(types) })
}

fn edge_types_key(types: &Option<Vec<EdgeType>>) -> String {
    match types {
        None => String::new(),
        Some(types) => types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(","),
    }
}

// ── /status ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub connections: u64,
    pub stats: mu_store::StoreStats,
    pub pid: u32,
    pub mubase_path: String,
}

pub async fn status(State(state): State<Arc<DaemonState>>) -> Result<impl IntoResponse, ApiError> {
    let project = state.default_project();
    let stats = {
        let store = project.store.lock().await;
        store.stats()?
    };
    let status = project.status(
        state.config.degraded_threshold,
        Duration::from_secs(state.config.degraded_window_secs),
    );
    Ok(Json(StatusResponse {
        status,
        uptime_seconds: state.uptime_seconds(),
        connections: state.connection_count(),
        stats,
        pid: std::process::id(),
        mubase_path: mu_core::workspace::mubase_path(&project.root)
            .display()
            .to_string(),
    }))
}

// ── /query ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct QueryRequest {
    pub muql: String,
    pub cwd: Option<String>,
    /// Block until the worker has committed at least this version.
    pub wait_for_version: Option<u64>,
}

pub async fn query(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_for(request.cwd.as_deref()).await?;
    if let Some(version) = request.wait_for_version {
        project
            .wait_for_version(version, Duration::from_secs(10))
            .await?;
    }
    let store = project.store.lock().await;
    let result = MuqlEngine::new(&store).execute(&request.muql)?;
    Ok(Json(result))
}

// ── /impact /ancestors ───────────────────────────────────

#[derive(Deserialize)]
pub struct TraversalRequest {
    pub node: String,
    pub edge_types: Option<Vec<String>>,
    pub cwd: Option<String>,
}

#[derive(Serialize)]
pub struct TraversalResponse {
    pub node: String,
    pub nodes: Vec<String>,
    pub count: usize,
}

async fn traversal(
    state: Arc<DaemonState>,
    request: TraversalRequest,
    op: &'static str,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = state.project_for(request.cwd.as_deref()).await?;
    let edge_types = parse_edge_types(&request.edge_types)?;
    let version = project.current_version();

    let store = project.store.lock().await;
    let engine = MuqlEngine::new(&store);
    let node = engine.resolve_node(&request.node)?;

    let key = CacheKey {
        op,
        node_id: node.id.clone(),
        edge_types: edge_types_key(&edge_types),
    };
    if let Some(hit) = project.cache.get(&key, version) {
        return Ok(Json(hit));
    }

    let graph = mu_core::AlgoGraph::from_edges(store.all_edge_triples()?);
    let nodes = match op {
        "impact" => graph.impact(&node.id, edge_types.as_deref()),
        _ => graph.ancestors(&node.id, edge_types.as_deref()),
    };
    let response = serde_json::to_value(TraversalResponse {
        node: node.id,
        count: nodes.len(),
        nodes,
    })
    .unwrap_or_default();
    project.cache.put(key, version, response.clone());
    Ok(Json(response))
}

pub async fn impact(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<TraversalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    traversal(state, request, "impact").await
}

pub async fn ancestors(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<TraversalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    traversal(state, request, "ancestors").await
}

// ── /cycles ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CyclesRequest {
    pub edge_types: Option<Vec<String>>,
    pub cwd: Option<String>,
}

pub async fn cycles(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<CyclesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_for(request.cwd.as_deref()).await?;
    let edge_types = parse_edge_types(&request.edge_types)?;
    let version = project.current_version();

    let key = CacheKey {
        op: "cycles",
        node_id: String::new(),
        edge_types: edge_types_key(&edge_types),
    };
    if let Some(hit) = project.cache.get(&key, version) {
        return Ok(Json(hit));
    }

    let store = project.store.lock().await;
    let graph = mu_core::AlgoGraph::from_edges(store.all_edge_triples()?);
    let cycles = graph.find_cycles(edge_types.as_deref());
    let response = serde_json::json!({
        "count": cycles.len(),
        "cycles": cycles,
    });
    project.cache.put(key, version, response.clone());
    Ok(Json(response))
}

// ── /deps ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DepsRequest {
    pub node: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_depth")]
    pub depth: u32,
    pub cwd: Option<String>,
}

fn default_direction() -> String {
    "dependencies".to_string()
}

fn default_depth() -> u32 {
    1
}

pub async fn deps(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<DepsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_for(request.cwd.as_deref()).await?;
    let store = project.store.lock().await;
    let engine = MuqlEngine::new(&store);
    let node = engine.resolve_node(&request.node)?;

    let nodes = match request.direction.as_str() {
        "dependencies" | "outgoing" => store.get_dependencies(&node.id, request.depth, None)?,
        "dependents" | "incoming" => store.get_dependents(&node.id, request.depth, None)?,
        "both" => store.get_neighbors(&node.id, "both")?,
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown direction: {other} (expected dependencies, dependents, or both)"
            )));
        }
    };

    let listing: Vec<serde_json::Value> = nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "id": n.id,
                "type": n.node_type.as_str(),
                "name": n.name,
                "file_path": n.file_path,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "node": node.id,
        "direction": request.direction,
        "depth": request.depth,
        "count": listing.len(),
        "nodes": listing,
    })))
}

// ── /context ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ContextRequest {
    pub question: String,
    pub max_tokens: Option<usize>,
    pub cwd: Option<String>,
}

pub async fn context(
    State(state): State<Arc<DaemonState>>,
    Json(request): Json<ContextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_for(request.cwd.as_deref()).await?;
    let store = project.store.lock().await;
    let assembled = assemble_context(
        &store,
        &request.question,
        request.max_tokens.unwrap_or(2000),
    )?;
    Ok(Json(assembled))
}
