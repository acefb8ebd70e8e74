//! SQLite-backed graph store
//!
//! Exclusive owner of the on-disk `.mubase` file. One writer at a
//! time, guarded by an advisory lock file; read-only handles skip the
//! lock and tolerate missing optional tables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;

use mu_core::{
    Edge, EdgeProperties, EdgeType, GraphEvent, ModuleAst, MuError, Node, NodeProperties, NodeType,
};

use crate::builder::{BuildOutput, GraphBuilder};
use crate::lock::LockFile;
use crate::schema::{AUX_SCHEMA_SQL, SCHEMA_SQL, VERSION};

/// One file's worth of graph mutations, committed atomically.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    /// Nodes that disappeared; incident edges cascade.
    pub remove_node_ids: Vec<String>,
    /// New and modified nodes (replace in place).
    pub upsert_nodes: Vec<Node>,
    /// Nodes whose edges are replaced wholesale.
    pub clear_edges_for: Vec<String>,
    pub insert_edges: Vec<Edge>,
}

/// Database statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub nodes: u64,
    pub edges: u64,
    pub nodes_by_type: BTreeMap<String, u64>,
    pub edges_by_type: BTreeMap<String, u64>,
    pub file_size_kb: f64,
    pub version: String,
    pub built_at: Option<String>,
    pub root_path: Option<String>,
}

pub struct GraphStore {
    conn: Connection,
    path: PathBuf,
    read_only: bool,
    aux_ready: bool,
    // Held for the lifetime of a writable store.
    _lock: Option<LockFile>,
}

impl GraphStore {
    /// Open (or create) the store in read/write mode, acquiring the
    /// writer lock. Fails with [`MuError::Lock`] when another live
    /// process holds it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MuError> {
        let path = path.as_ref().to_path_buf();
        let lock = LockFile::acquire(&path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MuError::io(parent.display().to_string(), e))?;
        }
        let conn = Connection::open(&path).map_err(storage_err)?;
        let mut store = GraphStore {
            conn,
            path,
            read_only: false,
            aux_ready: false,
            _lock: Some(lock),
        };
        store.init()?;
        Ok(store)
    }

    /// Open an existing store read-only. No lock is taken; writes and
    /// aux-table creation are unavailable.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, MuError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(MuError::NotFound(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err)?;
        Ok(GraphStore {
            conn,
            path,
            read_only: true,
            aux_ready: false,
            _lock: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn init(&mut self) -> Result<(), MuError> {
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(storage_err)?;
        self.conn
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(storage_err)?;

        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .ok();

        match existing {
            None => self.create_schema()?,
            Some(found) if found != VERSION => {
                tracing::warn!(found, expected = VERSION, "schema version mismatch, rebuilding");
                self.migrate()?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn create_schema(&self) -> Result<(), MuError> {
        self.conn.execute_batch(SCHEMA_SQL).map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata(key, value) VALUES ('version', ?1)",
                params![VERSION],
            )
            .map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata(key, value) VALUES ('created_at', ?1)",
                params![chrono::Utc::now().to_rfc3339()],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Migration for the first stable version is a clean rebuild.
    fn migrate(&self) -> Result<(), MuError> {
        for table in ["edges", "nodes", "metadata"] {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .map_err(storage_err)?;
        }
        self.create_schema()
    }

    fn require_writable(&self) -> Result<(), MuError> {
        if self.read_only {
            return Err(MuError::Storage("store is read-only".to_string()));
        }
        Ok(())
    }

    // ── CRUD ─────────────────────────────────────────────

    pub fn add_node(&self, node: &Node) -> Result<(), MuError> {
        self.require_writable()?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO nodes
                 (id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    node.id,
                    node.node_type.as_str(),
                    node.name,
                    node.qualified_name,
                    node.file_path,
                    node.line_start,
                    node.line_end,
                    node.properties.to_json(),
                    node.complexity,
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Updates replace in place; same statement as insert.
    pub fn update_node(&self, node: &Node) -> Result<(), MuError> {
        self.add_node(node)
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&self, node_id: &str) -> Result<(), MuError> {
        self.require_writable()?;
        self.remove_edges_for_node(node_id)?;
        self.conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![node_id])
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn add_edge(&self, edge: &Edge) -> Result<(), MuError> {
        self.require_writable()?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO edges (id, source_id, target_id, type, properties)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    edge.id,
                    edge.source_id,
                    edge.target_id,
                    edge.edge_type.as_str(),
                    edge.properties.to_json(),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn remove_edges_for_node(&self, node_id: &str) -> Result<(), MuError> {
        self.require_writable()?;
        self.conn
            .execute(
                "DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1",
                params![node_id],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Remove every node of a file, cascading to incident edges.
    pub fn remove_nodes_by_file(&self, rel_path: &str) -> Result<Vec<Node>, MuError> {
        self.require_writable()?;
        let removed = self.get_nodes_by_file(rel_path)?;
        for node in &removed {
            self.remove_node(&node.id)?;
        }
        Ok(removed)
    }

    pub fn get_node(&self, node_id: &str) -> Result<Option<Node>, MuError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity FROM nodes WHERE id = ?1")
            .map_err(storage_err)?;
        let mut rows = stmt
            .query_map(params![node_id], node_from_row)
            .map_err(storage_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub fn get_nodes(
        &self,
        node_type: Option<NodeType>,
        file_path: Option<&str>,
    ) -> Result<Vec<Node>, MuError> {
        let mut sql = String::from(
            "SELECT id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity FROM nodes",
        );
        let mut clauses = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(ty) = node_type {
            clauses.push(format!("type = ?{}", bind.len() + 1));
            bind.push(ty.as_str().to_string());
        }
        if let Some(path) = file_path {
            clauses.push(format!("file_path = ?{}", bind.len() + 1));
            bind.push(path.to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bind.iter()), node_from_row)
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    pub fn get_nodes_by_file(&self, rel_path: &str) -> Result<Vec<Node>, MuError> {
        self.get_nodes(None, Some(rel_path))
    }

    pub fn get_edges(
        &self,
        source_id: Option<&str>,
        target_id: Option<&str>,
        edge_type: Option<EdgeType>,
    ) -> Result<Vec<Edge>, MuError> {
        let mut sql = String::from("SELECT id, source_id, target_id, type, properties FROM edges");
        let mut clauses = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(source) = source_id {
            clauses.push(format!("source_id = ?{}", bind.len() + 1));
            bind.push(source.to_string());
        }
        if let Some(target) = target_id {
            clauses.push(format!("target_id = ?{}", bind.len() + 1));
            bind.push(target.to_string());
        }
        if let Some(ty) = edge_type {
            clauses.push(format!("type = ?{}", bind.len() + 1));
            bind.push(ty.as_str().to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bind.iter()), edge_from_row)
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    /// All edges, for loading the in-memory traversal graph.
    pub fn all_edge_triples(&self) -> Result<Vec<(String, String, EdgeType)>, MuError> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_id, target_id, type FROM edges ORDER BY id")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                let source: String = row.get(0)?;
                let target: String = row.get(1)?;
                let ty: String = row.get(2)?;
                Ok((source, target, ty))
            })
            .map_err(storage_err)?;
        let mut triples = Vec::new();
        for row in rows {
            let (source, target, ty) = row.map_err(storage_err)?;
            let Some(edge_type) = EdgeType::parse(&ty) else {
                continue;
            };
            triples.push((source, target, edge_type));
        }
        Ok(triples)
    }

    // ── Traversal queries ────────────────────────────────

    /// Nodes this node depends on (outgoing edges), up to `depth`
    /// levels. Cycles are bounded by the depth cap.
    pub fn get_dependencies(
        &self,
        node_id: &str,
        depth: u32,
        edge_types: Option<&[EdgeType]>,
    ) -> Result<Vec<Node>, MuError> {
        self.traverse(node_id, depth, edge_types, true)
    }

    /// Nodes that depend on this node (incoming edges).
    pub fn get_dependents(
        &self,
        node_id: &str,
        depth: u32,
        edge_types: Option<&[EdgeType]>,
    ) -> Result<Vec<Node>, MuError> {
        self.traverse(node_id, depth, edge_types, false)
    }

    fn traverse(
        &self,
        node_id: &str,
        depth: u32,
        edge_types: Option<&[EdgeType]>,
        outgoing: bool,
    ) -> Result<Vec<Node>, MuError> {
        // Edge types come from a closed enum, so inlining them is safe.
        let type_filter = match edge_types {
            Some(types) if !types.is_empty() => {
                let list = types
                    .iter()
                    .map(|t| format!("'{}'", t.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("AND e.type IN ({list})")
            }
            _ => String::new(),
        };
        let (from_col, to_col) = if outgoing {
            ("source_id", "target_id")
        } else {
            ("target_id", "source_id")
        };

        let sql = format!(
            "WITH RECURSIVE walk(id, depth) AS (
                 SELECT e.{to_col}, 1 FROM edges e WHERE e.{from_col} = ?1 {type_filter}
                 UNION
                 SELECT e.{to_col}, w.depth + 1
                 FROM walk w JOIN edges e ON e.{from_col} = w.id
                 WHERE w.depth < ?2 {type_filter}
             )
             SELECT DISTINCT n.id, n.type, n.name, n.qualified_name, n.file_path,
                    n.line_start, n.line_end, n.properties, n.complexity
             FROM nodes n JOIN walk w ON n.id = w.id
             ORDER BY n.id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(params![node_id, depth], node_from_row)
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    /// Children via CONTAINS edges.
    pub fn get_children(&self, node_id: &str) -> Result<Vec<Node>, MuError> {
        self.get_dependencies(node_id, 1, Some(&[EdgeType::Contains]))
    }

    /// The containing node, if any.
    pub fn get_parent(&self, node_id: &str) -> Result<Option<Node>, MuError> {
        Ok(self
            .get_dependents(node_id, 1, Some(&[EdgeType::Contains]))?
            .into_iter()
            .next())
    }

    /// Neighbors in either or both directions, deduplicated.
    pub fn get_neighbors(&self, node_id: &str, direction: &str) -> Result<Vec<Node>, MuError> {
        let mut neighbors = Vec::new();
        if matches!(direction, "both" | "outgoing") {
            neighbors.extend(self.get_dependencies(node_id, 1, None)?);
        }
        if matches!(direction, "both" | "incoming") {
            neighbors.extend(self.get_dependents(node_id, 1, None)?);
        }
        let mut seen = std::collections::HashSet::new();
        neighbors.retain(|n| seen.insert(n.id.clone()));
        Ok(neighbors)
    }

    // ── Search ───────────────────────────────────────────

    /// Exact match, or LIKE when the pattern contains `%`.
    pub fn find_by_name(&self, name: &str, node_type: Option<NodeType>) -> Result<Vec<Node>, MuError> {
        let op = if name.contains('%') { "LIKE" } else { "=" };
        let mut sql = format!(
            "SELECT id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity
             FROM nodes WHERE name {op} ?1"
        );
        let mut bind = vec![name.to_string()];
        if let Some(ty) = node_type {
            sql.push_str(" AND type = ?2");
            bind.push(ty.as_str().to_string());
        }
        sql.push_str(" ORDER BY id");
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bind.iter()), node_from_row)
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    /// Suffix match for fuzzy node references.
    pub fn find_by_suffix(&self, suffix: &str, node_type: Option<NodeType>) -> Result<Vec<Node>, MuError> {
        self.find_by_name(&format!("%{suffix}"), node_type)
    }

    /// Nodes with complexity in range, highest first.
    pub fn find_by_complexity(
        &self,
        min_complexity: u32,
        max_complexity: Option<u32>,
    ) -> Result<Vec<Node>, MuError> {
        let sql = match max_complexity {
            Some(_) => {
                "SELECT id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity
                 FROM nodes WHERE complexity >= ?1 AND complexity <= ?2
                 ORDER BY complexity DESC, id"
            }
            None => {
                "SELECT id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity
                 FROM nodes WHERE complexity >= ?1
                 ORDER BY complexity DESC, id"
            }
        };
        let mut stmt = self.conn.prepare(sql).map_err(storage_err)?;
        let rows = match max_complexity {
            Some(max) => stmt
                .query_map(params![min_complexity, max], node_from_row)
                .map_err(storage_err)?
                .collect::<Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![min_complexity], node_from_row)
                .map_err(storage_err)?
                .collect::<Result<Vec<_>, _>>(),
        };
        rows.map_err(storage_err)
    }

    // ── Bulk build ───────────────────────────────────────

    /// Atomically replace the whole graph: delete everything, update
    /// metadata, insert the freshly built nodes and edges.
    pub fn build(&mut self, modules: &[ModuleAst], root_path: &Path) -> Result<BuildOutput, MuError> {
        self.require_writable()?;
        let output = GraphBuilder::build(modules);

        let tx = self.conn.transaction().map_err(storage_err)?;
        tx.execute("DELETE FROM edges", []).map_err(storage_err)?;
        tx.execute("DELETE FROM nodes", []).map_err(storage_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata(key, value) VALUES ('built_at', ?1)",
            params![chrono::Utc::now().to_rfc3339()],
        )
        .map_err(storage_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata(key, value) VALUES ('root_path', ?1)",
            params![root_path.display().to_string()],
        )
        .map_err(storage_err)?;

        {
            let mut node_stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO nodes
                     (id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(storage_err)?;
            for node in &output.nodes {
                node_stmt
                    .execute(params![
                        node.id,
                        node.node_type.as_str(),
                        node.name,
                        node.qualified_name,
                        node.file_path,
                        node.line_start,
                        node.line_end,
                        node.properties.to_json(),
                        node.complexity,
                    ])
                    .map_err(storage_err)?;
            }

            let mut edge_stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO edges (id, source_id, target_id, type, properties)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(storage_err)?;
            for edge in &output.edges {
                edge_stmt
                    .execute(params![
                        edge.id,
                        edge.source_id,
                        edge.target_id,
                        edge.edge_type.as_str(),
                        edge.properties.to_json(),
                    ])
                    .map_err(storage_err)?;
            }
        }
        tx.commit().map_err(storage_err)?;

        if output.dropped_calls > 0 {
            tracing::debug!(dropped = output.dropped_calls, "unresolved call sites dropped");
        }
        Ok(output)
    }

    /// Apply an incremental change set in one transaction; used by the
    /// update worker so a file's changes land together or not at all.
    pub fn apply_change_set(&mut self, change: &ChangeSet) -> Result<(), MuError> {
        self.require_writable()?;
        let tx = self.conn.transaction().map_err(storage_err)?;

        for node_id in &change.clear_edges_for {
            tx.execute(
                "DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1",
                params![node_id],
            )
            .map_err(storage_err)?;
        }
        for node_id in &change.remove_node_ids {
            tx.execute(
                "DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1",
                params![node_id],
            )
            .map_err(storage_err)?;
            tx.execute("DELETE FROM nodes WHERE id = ?1", params![node_id])
                .map_err(storage_err)?;
        }
        for node in &change.upsert_nodes {
            tx.execute(
                "INSERT OR REPLACE INTO nodes
                 (id, type, name, qualified_name, file_path, line_start, line_end, properties, complexity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    node.id,
                    node.node_type.as_str(),
                    node.name,
                    node.qualified_name,
                    node.file_path,
                    node.line_start,
                    node.line_end,
                    node.properties.to_json(),
                    node.complexity,
                ],
            )
            .map_err(storage_err)?;
        }
        for edge in &change.insert_edges {
            tx.execute(
                "INSERT OR REPLACE INTO edges (id, source_id, target_id, type, properties)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    edge.id,
                    edge.source_id,
                    edge.target_id,
                    edge.edge_type.as_str(),
                    edge.properties.to_json(),
                ],
            )
            .map_err(storage_err)?;
        }

        tx.commit().map_err(storage_err)
    }

    // ── Stats / raw SQL ──────────────────────────────────

    pub fn stats(&self) -> Result<StoreStats, MuError> {
        let count = |sql: &str| -> u64 {
            self.conn
                .query_row(sql, [], |row| row.get::<_, i64>(0))
                .unwrap_or(0) as u64
        };
        let group = |sql: &str| -> BTreeMap<String, u64> {
            let mut map = BTreeMap::new();
            if let Ok(mut stmt) = self.conn.prepare(sql) {
                if let Ok(rows) = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                }) {
                    for row in rows.flatten() {
                        map.insert(row.0, row.1 as u64);
                    }
                }
            }
            map
        };
        let metadata = self.metadata();
        let file_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreStats {
            nodes: count("SELECT COUNT(*) FROM nodes"),
            edges: count("SELECT COUNT(*) FROM edges"),
            nodes_by_type: group("SELECT type, COUNT(*) FROM nodes GROUP BY type"),
            edges_by_type: group("SELECT type, COUNT(*) FROM edges GROUP BY type"),
            file_size_kb: file_size as f64 / 1024.0,
            version: metadata
                .get("version")
                .cloned()
                .unwrap_or_else(|| VERSION.to_string()),
            built_at: metadata.get("built_at").cloned(),
            root_path: metadata.get("root_path").cloned(),
        })
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Ok(mut stmt) = self.conn.prepare("SELECT key, value FROM metadata") {
            if let Ok(rows) = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            }) {
                for row in rows.flatten() {
                    map.insert(row.0, row.1);
                }
            }
        }
        map
    }

    /// Raw SQL escape hatch for the query engine. Read-only: only
    /// SELECT (or WITH ... SELECT) statements are accepted.
    pub fn execute_raw(
        &self,
        sql: &str,
    ) -> Result<(Vec<String>, Vec<Vec<serde_json::Value>>), MuError> {
        let head = sql.trim_start().to_ascii_uppercase();
        if !(head.starts_with("SELECT") || head.starts_with("WITH")) {
            return Err(MuError::Storage("only SELECT statements are allowed".to_string()));
        }
        let mut stmt = self.conn.prepare(sql).map_err(storage_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();
        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value = match row.get_ref(i)? {
                        rusqlite::types::ValueRef::Null => serde_json::Value::Null,
                        rusqlite::types::ValueRef::Integer(v) => serde_json::Value::from(v),
                        rusqlite::types::ValueRef::Real(v) => serde_json::Value::from(v),
                        rusqlite::types::ValueRef::Text(v) => {
                            serde_json::Value::from(String::from_utf8_lossy(v).into_owned())
                        }
                        rusqlite::types::ValueRef::Blob(v) => {
                            serde_json::Value::from(format!("<blob {} bytes>", v.len()))
                        }
                    };
                    values.push(value);
                }
                Ok(values)
            })
            .map_err(storage_err)?;
        let rows = rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)?;
        Ok((columns, rows))
    }

    // ── Aux tables ───────────────────────────────────────

    /// Create the optional feature tables. On a read-only handle this
    /// degrades to a no-op; callers never fail because of it.
    pub fn ensure_aux_tables(&mut self) -> bool {
        if self.aux_ready {
            return true;
        }
        if self.read_only {
            return false;
        }
        match self.conn.execute_batch(AUX_SCHEMA_SQL) {
            Ok(()) => {
                self.aux_ready = true;
                true
            }
            Err(e) => {
                tracing::warn!("aux tables unavailable: {e}");
                false
            }
        }
    }

    /// Append a graph event to `node_history`. Best effort: failures
    /// are logged, never propagated.
    pub fn record_history(&mut self, event: &GraphEvent) {
        if !self.ensure_aux_tables() {
            return;
        }
        let outcome = self.conn.execute(
            "INSERT INTO node_history (node_id, event, file_path, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.node_id,
                serde_json::to_string(&event.kind).unwrap_or_default(),
                event.file_path,
                chrono::Utc::now().to_rfc3339(),
            ],
        );
        if let Err(e) = outcome {
            tracing::warn!("history append failed: {e}");
        }
    }

    /// Row count of an aux table; 0 when the table is absent.
    pub fn aux_count(&self, table: &str) -> u64 {
        const AUX_TABLES: [&str; 5] =
            ["patterns", "memories", "snapshots", "node_history", "edge_history"];
        if !AUX_TABLES.contains(&table) {
            return 0;
        }
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|v| v as u64)
            .unwrap_or(0)
    }
}

fn storage_err(e: rusqlite::Error) -> MuError {
    MuError::Storage(e.to_string())
}

fn node_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
    let type_str: String = row.get(1)?;
    let properties_json: String = row.get(7)?;
    let properties: NodeProperties = serde_json::from_str(&properties_json)
        .unwrap_or(NodeProperties::External {
            package: String::new(),
        });
    Ok(Node {
        id: row.get(0)?,
        node_type: NodeType::parse(&type_str).unwrap_or(NodeType::External),
        name: row.get(2)?,
        qualified_name: row.get(3)?,
        file_path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        line_start: row.get(5)?,
        line_end: row.get(6)?,
        properties,
        complexity: row.get::<_, i64>(8)? as u32,
    })
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
    let type_str: String = row.get(3)?;
    let properties_json: String = row.get(4)?;
    let properties: EdgeProperties = serde_json::from_str(&properties_json).unwrap_or_default();
    Ok(Edge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        edge_type: EdgeType::parse(&type_str).unwrap_or(EdgeType::Uses),
        properties,
    })
}
