//! MUQL executor
//!
//! Translates parsed queries onto graph store primitives and the
//! in-memory traversal graph. All queries are read-only and bounded:
//! non-aggregate selects default to LIMIT 1000, traversals to depth 5,
//! and the whole call carries a deadline.

use std::time::{Duration, Instant};

use mu_core::model::is_node_id;
use mu_core::{AlgoGraph, EdgeType, Node, NodeType};
use mu_store::GraphStore;

use crate::ast::*;
use crate::{DEFAULT_LIMIT, DEFAULT_MAX_DEPTH, DEFAULT_TIMEOUT_MS, QueryError, QueryResult, parser};

const NODE_COLUMNS: [&str; 9] = [
    "id",
    "type",
    "name",
    "qualified_name",
    "file_path",
    "line_start",
    "line_end",
    "properties",
    "complexity",
];

const EDGE_COLUMNS: [&str; 5] = ["id", "source_id", "target_id", "type", "properties"];

/// Columns used for node listings produced by SHOW/FIND.
const LISTING_COLUMNS: [&str; 5] = ["id", "type", "name", "file_path", "complexity"];

pub struct MuqlEngine<'a> {
    store: &'a GraphStore,
    timeout: Duration,
}

impl<'a> MuqlEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        MuqlEngine {
            store,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute and fold any error into the result envelope.
    pub fn query(&self, text: &str) -> QueryResult {
        let started = Instant::now();
        let mut result = match self.execute(text) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(query = text, "query failed: {e}");
                let mut failed = QueryResult::empty();
                failed.error = Some(e.to_string());
                failed
            }
        };
        result.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        result
    }

    /// Execute, surfacing the typed error.
    pub fn execute(&self, text: &str) -> Result<QueryResult, QueryError> {
        let deadline = Instant::now() + self.timeout;
        let query = parser::parse(text)?;
        self.run(query, deadline)
    }

    /// Describe what a query would do without running it.
    pub fn explain(&self, text: &str) -> Result<String, QueryError> {
        let query = parser::parse(text)?;
        Ok(match query {
            Query::Select(select) => format!(
                "scan {} with {}filter, project {:?}",
                select.table.as_str(),
                if select.condition.is_some() { "" } else { "no " },
                select.columns,
            ),
            Query::Show(show) => format!(
                "resolve {:?}, traverse {:?} depth {}",
                show.node_ref,
                show.relation,
                show.depth.unwrap_or(1)
            ),
            Query::FindMatching { table, pattern } => {
                format!("scan {} names against {pattern:?}", table.as_str())
            }
            Query::FindCalling { node_ref, .. } => {
                format!("resolve {node_ref:?}, collect CALLS dependents")
            }
            Query::FindWithDecorator { decorator, .. } => {
                format!("scan decorated definitions for {decorator:?}")
            }
            Query::FindImporting { node_ref, .. } => {
                format!("resolve {node_ref:?}, collect IMPORTS dependents")
            }
            Query::FindCycles { .. } => "load edge snapshot, run SCC detection".to_string(),
            Query::Path { from, to, .. } => format!("BFS from {from:?} to {to:?}"),
            Query::Analyze { kind, .. } => format!("run {kind:?} analysis"),
            Query::Describe(_) => "schema lookup".to_string(),
        })
    }

    fn run(&self, query: Query, deadline: Instant) -> Result<QueryResult, QueryError> {
        check_deadline(deadline)?;
        match query {
            Query::Select(select) => self.run_select(select),
            Query::Show(show) => self.run_show(show, deadline),
            Query::FindMatching { table, pattern } => self.run_find_matching(table, &pattern),
            Query::FindCalling { table, node_ref } => self.run_find_calling(table, &node_ref),
            Query::FindWithDecorator { table, decorator } => {
                self.run_find_with_decorator(table, &decorator)
            }
            Query::FindImporting { table, node_ref } => self.run_find_importing(table, &node_ref),
            Query::FindCycles { edge_type } => self.run_cycles(edge_type.as_deref(), deadline),
            Query::Path {
                from,
                to,
                max_depth,
                via,
            } => self.run_path(&from, &to, max_depth, via.as_deref(), deadline),
            Query::Analyze { kind, node_ref } => self.run_analyze(kind, node_ref.as_deref(), deadline),
            Query::Describe(table) => self.run_describe(table),
        }
    }

    // ── SELECT ───────────────────────────────────────────

    fn run_select(&self, select: SelectQuery) -> Result<QueryResult, QueryError> {
        let table_columns: &[&str] = match select.table {
            Table::Edges => &EDGE_COLUMNS,
            _ => &NODE_COLUMNS,
        };
        let validate = |column: &str| -> Result<(), QueryError> {
            if table_columns.contains(&column) {
                Ok(())
            } else {
                Err(QueryError::UnknownColumn(column.to_string()))
            }
        };

        let projection = match &select.columns {
            Columns::All => "*".to_string(),
            Columns::Named(names) => {
                for name in names {
                    validate(name)?;
                }
                names.join(", ")
            }
            Columns::CountStar => "COUNT(*)".to_string(),
            Columns::Avg(column) => {
                validate(column)?;
                format!("AVG({column})")
            }
            Columns::Sum(column) => {
                validate(column)?;
                format!("SUM({column})")
            }
        };

        let base_table = match select.table {
            Table::Edges => "edges",
            _ => "nodes",
        };
        let mut clauses: Vec<String> = Vec::new();
        if let Some(node_type) = select.table.node_type() {
            clauses.push(format!("type = '{}'", node_type.as_str()));
        }
        if let Some(condition) = &select.condition {
            clauses.push(cond_to_sql(condition, &validate)?);
        }

        let mut sql = format!("SELECT {projection} FROM {base_table}");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some((column, descending)) = &select.order_by {
            validate(column)?;
            sql.push_str(&format!(
                " ORDER BY {column}{}",
                if *descending { " DESC" } else { "" }
            ));
        }
        let limit = match (select.columns.is_aggregate(), select.limit) {
            (true, _) => None,
            (false, Some(limit)) => Some(limit),
            (false, None) => Some(DEFAULT_LIMIT),
        };
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let (columns, rows) = self.store.execute_raw(&sql)?;
        Ok(QueryResult::with_rows(columns, rows))
    }

    // ── SHOW ─────────────────────────────────────────────

    fn run_show(&self, show: ShowQuery, deadline: Instant) -> Result<QueryResult, QueryError> {
        let node = self.resolve(&show.node_ref)?;
        let via = parse_edge_types(show.via.as_deref())?;
        let via_slice = via.as_deref();
        check_deadline(deadline)?;

        let nodes = match show.relation {
            ShowRelation::Dependencies => {
                self.store
                    .get_dependencies(&node.id, show.depth.unwrap_or(1), via_slice)?
            }
            ShowRelation::Dependents => {
                self.store
                    .get_dependents(&node.id, show.depth.unwrap_or(1), via_slice)?
            }
            ShowRelation::Children => self.store.get_children(&node.id)?,
            ShowRelation::Callers => {
                self.store
                    .get_dependents(&node.id, show.depth.unwrap_or(1), Some(&[EdgeType::Calls]))?
            }
            ShowRelation::Callees => {
                self.store
                    .get_dependencies(&node.id, show.depth.unwrap_or(1), Some(&[EdgeType::Calls]))?
            }
            ShowRelation::Impact | ShowRelation::Ancestors => {
                let graph = AlgoGraph::from_edges(self.store.all_edge_triples()?);
                check_deadline(deadline)?;
                let depth = show.depth.unwrap_or(DEFAULT_MAX_DEPTH);
                let ids = if show.relation == ShowRelation::Impact {
                    graph.impact_within(&node.id, via_slice, depth)
                } else {
                    graph.ancestors_within(&node.id, via_slice, depth)
                };
                self.nodes_for_ids(&ids)?
            }
        };
        Ok(node_listing(nodes))
    }

    // ── FIND ─────────────────────────────────────────────

    fn run_find_matching(&self, table: Table, pattern: &str) -> Result<QueryResult, QueryError> {
        let node_type = node_table_filter(table)?;
        // Glob syntax converts onto SQL LIKE; a pattern that already
        // carries % is used verbatim.
        let like = if pattern.contains('*') || pattern.contains('?') {
            pattern.replace('*', "%").replace('?', "_")
        } else {
            pattern.to_string()
        };
        let like = if like.contains('%') || like.contains('_') {
            like
        } else {
            format!("%{like}%")
        };
        let nodes = self.store.find_by_name(&like, node_type)?;
        Ok(node_listing(nodes))
    }

    fn run_find_calling(&self, table: Table, node_ref: &str) -> Result<QueryResult, QueryError> {
        let target = self.resolve(node_ref)?;
        let callers = self
            .store
            .get_dependents(&target.id, 1, Some(&[EdgeType::Calls]))?;
        let projected = self.project_to_table(callers, table)?;
        Ok(node_listing(projected))
    }

    fn run_find_importing(&self, table: Table, node_ref: &str) -> Result<QueryResult, QueryError> {
        let target = self.resolve(node_ref)?;
        let importers = self
            .store
            .get_dependents(&target.id, 1, Some(&[EdgeType::Imports]))?;
        let projected = self.project_to_table(importers, table)?;
        Ok(node_listing(projected))
    }

    fn run_find_with_decorator(
        &self,
        table: Table,
        decorator: &str,
    ) -> Result<QueryResult, QueryError> {
        let node_type = node_table_filter(table)?;
        let wanted = decorator.trim_start_matches('@');
        let nodes = self.store.get_nodes(node_type, None)?;
        let matched = nodes
            .into_iter()
            .filter(|node| {
                let decorators = match &node.properties {
                    mu_core::NodeProperties::Function { decorators, .. } => decorators,
                    mu_core::NodeProperties::Class { decorators, .. } => decorators,
                    _ => return false,
                };
                decorators.iter().any(|d| {
                    d == wanted
                        || d.starts_with(&format!("{wanted}("))
                        || d.ends_with(&format!(".{wanted}"))
                })
            })
            .collect();
        Ok(node_listing(matched))
    }

    fn run_cycles(
        &self,
        edge_type: Option<&str>,
        deadline: Instant,
    ) -> Result<QueryResult, QueryError> {
        let via = parse_edge_types(edge_type)?;
        let graph = AlgoGraph::from_edges(self.store.all_edge_triples()?);
        check_deadline(deadline)?;
        let cycles = graph.find_cycles(via.as_deref());

        let columns = vec!["cycle".to_string(), "length".to_string(), "nodes".to_string()];
        let rows = cycles
            .iter()
            .enumerate()
            .map(|(i, cycle)| {
                vec![
                    serde_json::Value::from(i as u64 + 1),
                    serde_json::Value::from(cycle.len() as u64),
                    serde_json::Value::from(cycle.join(" -> ")),
                ]
            })
            .collect();
        Ok(QueryResult::with_rows(columns, rows))
    }

    fn run_path(
        &self,
        from: &str,
        to: &str,
        max_depth: Option<u32>,
        via: Option<&str>,
        deadline: Instant,
    ) -> Result<QueryResult, QueryError> {
        let from_node = self.resolve(from)?;
        let to_node = self.resolve(to)?;
        let via = parse_edge_types(via)?;
        let graph = AlgoGraph::from_edges(self.store.all_edge_triples()?);
        check_deadline(deadline)?;

        let path = graph.shortest_path_via(
            &from_node.id,
            &to_node.id,
            max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            via.as_deref(),
        );

        let columns = vec!["step".to_string(), "node_id".to_string()];
        let rows = path
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                vec![
                    serde_json::Value::from(i as u64),
                    serde_json::Value::from(id),
                ]
            })
            .collect();
        Ok(QueryResult::with_rows(columns, rows))
    }

    fn run_analyze(
        &self,
        kind: AnalyzeKind,
        node_ref: Option<&str>,
        deadline: Instant,
    ) -> Result<QueryResult, QueryError> {
        match kind {
            AnalyzeKind::Complexity => {
                let functions = self.store.find_by_complexity(1, None)?;
                let total: u64 = functions
                    .iter()
                    .filter(|n| n.node_type == NodeType::Function)
                    .map(|n| n.complexity as u64)
                    .sum();
                let count = functions
                    .iter()
                    .filter(|n| n.node_type == NodeType::Function)
                    .count();
                let average = if count == 0 {
                    0.0
                } else {
                    total as f64 / count as f64
                };

                let columns = vec![
                    "name".to_string(),
                    "file_path".to_string(),
                    "complexity".to_string(),
                ];
                let mut rows: Vec<Vec<serde_json::Value>> = functions
                    .iter()
                    .filter(|n| n.node_type == NodeType::Function)
                    .take(10)
                    .map(|n| {
                        vec![
                            serde_json::Value::from(n.name.clone()),
                            serde_json::Value::from(n.file_path.clone()),
                            serde_json::Value::from(n.complexity),
                        ]
                    })
                    .collect();
                rows.push(vec![
                    serde_json::Value::from("(average)"),
                    serde_json::Value::from(""),
                    serde_json::Value::from(average),
                ]);
                Ok(QueryResult::with_rows(columns, rows))
            }
            AnalyzeKind::Hotspots => {
                let (columns, rows) = self.store.execute_raw(
                    "SELECT file_path, SUM(complexity) AS total_complexity, COUNT(*) AS functions
                     FROM nodes WHERE type = 'function'
                     GROUP BY file_path ORDER BY total_complexity DESC LIMIT 10",
                )?;
                Ok(QueryResult::with_rows(columns, rows))
            }
            AnalyzeKind::Circular => self.run_cycles(None, deadline),
            AnalyzeKind::Impact => {
                let reference =
                    node_ref.ok_or_else(|| QueryError::UnresolvedNode("<missing FOR>".to_string()))?;
                self.run_show(
                    ShowQuery {
                        relation: ShowRelation::Impact,
                        node_ref: reference.to_string(),
                        depth: None,
                        via: None,
                    },
                    deadline,
                )
            }
        }
    }

    fn run_describe(&self, table: Option<Table>) -> Result<QueryResult, QueryError> {
        match table {
            None => {
                let columns = vec!["table".to_string(), "description".to_string()];
                let rows = [
                    ("nodes", "all nodes (modules, classes, functions, externals)"),
                    ("modules", "file/module level entities"),
                    ("classes", "class/struct/interface definitions"),
                    ("functions", "function/method definitions"),
                    ("edges", "typed relationships between nodes"),
                ]
                .iter()
                .map(|(name, desc)| {
                    vec![
                        serde_json::Value::from(*name),
                        serde_json::Value::from(*desc),
                    ]
                })
                .collect();
                Ok(QueryResult::with_rows(columns, rows))
            }
            Some(table) => {
                let schema: &[(&str, &str)] = match table {
                    Table::Edges => &[
                        ("id", "TEXT"),
                        ("source_id", "TEXT"),
                        ("target_id", "TEXT"),
                        ("type", "TEXT"),
                        ("properties", "JSON"),
                    ],
                    _ => &[
                        ("id", "TEXT"),
                        ("type", "TEXT"),
                        ("name", "TEXT"),
                        ("qualified_name", "TEXT"),
                        ("file_path", "TEXT"),
                        ("line_start", "INTEGER"),
                        ("line_end", "INTEGER"),
                        ("properties", "JSON"),
                        ("complexity", "INTEGER"),
                    ],
                };
                let columns = vec!["column".to_string(), "type".to_string()];
                let rows = schema
                    .iter()
                    .map(|(name, ty)| {
                        vec![
                            serde_json::Value::from(*name),
                            serde_json::Value::from(*ty),
                        ]
                    })
                    .collect();
                Ok(QueryResult::with_rows(columns, rows))
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────

    /// Public node-ref resolution, shared with the daemon endpoints.
    pub fn resolve_node(&self, reference: &str) -> Result<Node, QueryError> {
        self.resolve(reference)
    }

    /// Node-ref resolution: full id, exact name, then suffix match
    /// (exact simple-name hits preferred on collision).
    fn resolve(&self, reference: &str) -> Result<Node, QueryError> {
        if is_node_id(reference) {
            return self
                .store
                .get_node(reference)?
                .ok_or_else(|| QueryError::UnresolvedNode(reference.to_string()));
        }

        let exact = self.store.find_by_name(reference, None)?;
        if let Some(node) = exact.into_iter().next() {
            return Ok(node);
        }

        let mut candidates = self.store.find_by_suffix(reference, None)?;
        if candidates.is_empty() {
            return Err(QueryError::UnresolvedNode(reference.to_string()));
        }
        candidates.sort_by(|a, b| {
            let a_exact = a.name == reference;
            let b_exact = b.name == reference;
            b_exact.cmp(&a_exact).then_with(|| a.id.cmp(&b.id))
        });
        Ok(candidates.remove(0))
    }

    fn nodes_for_ids(&self, ids: &[String]) -> Result<Vec<Node>, QueryError> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.store.get_node(id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Map caller/importer nodes onto the requested table: functions
    /// stay as-is, classes map to the containing class, modules to the
    /// containing module.
    fn project_to_table(&self, nodes: Vec<Node>, table: Table) -> Result<Vec<Node>, QueryError> {
        let wanted = match table {
            Table::Nodes => return Ok(nodes),
            Table::Functions => NodeType::Function,
            Table::Classes => NodeType::Class,
            Table::Modules => NodeType::Module,
            Table::Edges => return Err(QueryError::UnknownTable("edges".to_string())),
        };
        let mut projected = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for node in nodes {
            let mapped = if node.node_type == wanted {
                Some(node)
            } else if wanted == NodeType::Class {
                self.store
                    .get_parent(&node.id)?
                    .filter(|p| p.node_type == NodeType::Class)
            } else if wanted == NodeType::Module {
                let module_id = mu_core::model::module_id(&node.file_path);
                self.store.get_node(&module_id)?
            } else {
                None
            };
            if let Some(node) = mapped {
                if seen.insert(node.id.clone()) {
                    projected.push(node);
                }
            }
        }
        Ok(projected)
    }
}

fn check_deadline(deadline: Instant) -> Result<(), QueryError> {
    if Instant::now() >= deadline {
        return Err(QueryError::Timeout);
    }
    Ok(())
}

fn node_table_filter(table: Table) -> Result<Option<NodeType>, QueryError> {
    match table {
        Table::Edges => Err(QueryError::UnknownTable("edges".to_string())),
        other => Ok(other.node_type()),
    }
}

fn parse_edge_types(text: Option<&str>) -> Result<Option<Vec<EdgeType>>, QueryError> {
    let Some(text) = text else {
        return Ok(None);
    };
    let mut types = Vec::new();
    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let parsed =
            EdgeType::parse(part).ok_or_else(|| QueryError::UnknownColumn(part.to_string()))?;
        types.push(parsed);
    }
    Ok(if types.is_empty() { None } else { Some(types) })
}

fn node_listing(nodes: Vec<Node>) -> QueryResult {
    let columns = LISTING_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows = nodes
        .into_iter()
        .map(|node| {
            vec![
                serde_json::Value::from(node.id),
                serde_json::Value::from(node.node_type.as_str()),
                serde_json::Value::from(node.name),
                serde_json::Value::from(node.file_path),
                serde_json::Value::from(node.complexity),
            ]
        })
        .collect();
    QueryResult::with_rows(columns, rows)
}

fn escape_sql_str(value: &str) -> String {
    value.replace('\'', "''")
}

fn value_to_sql(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{}'", escape_sql_str(s)),
        Value::Num(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
    }
}

fn cond_to_sql(
    cond: &Cond,
    validate: &impl Fn(&str) -> Result<(), QueryError>,
) -> Result<String, QueryError> {
    Ok(match cond {
        Cond::Cmp { column, op, value } => {
            validate(column)?;
            format!("{column} {} {}", op.sql(), value_to_sql(value))
        }
        Cond::In {
            column,
            values,
            negated,
        } => {
            validate(column)?;
            let list = values.iter().map(value_to_sql).collect::<Vec<_>>().join(", ");
            format!(
                "{column} {}IN ({list})",
                if *negated { "NOT " } else { "" }
            )
        }
        Cond::And(left, right) => format!(
            "({} AND {})",
            cond_to_sql(left, validate)?,
            cond_to_sql(right, validate)?
        ),
        Cond::Or(left, right) => format!(
            "({} OR {})",
            cond_to_sql(left, validate)?,
            cond_to_sql(right, validate)?
        ),
    })
}
