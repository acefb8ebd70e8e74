//! In-memory traversal graph built from the persisted edge set
//!
//! A snapshot loaded on demand from the edges table. All algorithms
//! are read-only; the store never observes this structure.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::EdgeType;

/// Directed multigraph over node id strings.
pub struct AlgoGraph {
    inner: DiGraph<String, EdgeType>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for AlgoGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgoGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl AlgoGraph {
    pub fn new() -> Self {
        AlgoGraph {
            inner: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build from `(source_id, target_id, edge_type)` triples.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (String, String, EdgeType)>,
    {
        let mut graph = AlgoGraph::new();
        for (source, target, edge_type) in edges {
            graph.add_edge(&source, &target, edge_type);
        }
        graph
    }

    fn intern(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.inner.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, source: &str, target: &str, edge_type: EdgeType) {
        let s = self.intern(source);
        let t = self.intern(target);
        self.inner.add_edge(s, t, edge_type);
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Neighbors of `id` in `dir` over the edge-type filter, sorted
    /// lexicographically for deterministic traversal order.
    fn neighbors(&self, idx: NodeIndex, dir: Direction, filter: Option<&[EdgeType]>) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .inner
            .edges_directed(idx, dir)
            .filter(|e| filter.is_none_or(|kinds| kinds.contains(e.weight())))
            .map(|e| match dir {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect();
        out.sort_by(|a, b| self.inner[*a].cmp(&self.inner[*b]));
        out.dedup();
        out
    }

    fn bfs(&self, start: &str, dir: Direction, filter: Option<&[EdgeType]>, max_depth: Option<u32>) -> Vec<String> {
        let Some(&start_idx) = self.index.get(start) else {
            return Vec::new();
        };
        let mut visited: HashSet<NodeIndex> = HashSet::from([start_idx]);
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(start_idx, 0)]);
        let mut reached = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|cap| depth >= cap) {
                continue;
            }
            for next in self.neighbors(current, dir, filter) {
                if visited.insert(next) {
                    reached.push(self.inner[next].clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }
        reached
    }

    /// All nodes reachable from `node_id` by forward BFS. Excludes the
    /// start node. O(V+E).
    pub fn impact(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> Vec<String> {
        self.bfs(node_id, Direction::Outgoing, edge_types, None)
    }

    /// Same as [`impact`](Self::impact) with arcs reversed.
    pub fn ancestors(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> Vec<String> {
        self.bfs(node_id, Direction::Incoming, edge_types, None)
    }

    /// Depth-capped variants used by SHOW queries.
    pub fn impact_within(&self, node_id: &str, edge_types: Option<&[EdgeType]>, depth: u32) -> Vec<String> {
        self.bfs(node_id, Direction::Outgoing, edge_types, Some(depth))
    }

    pub fn ancestors_within(&self, node_id: &str, edge_types: Option<&[EdgeType]>, depth: u32) -> Vec<String> {
        self.bfs(node_id, Direction::Incoming, edge_types, Some(depth))
    }

    /// Enumerate nontrivial strongly connected components: size ≥ 2,
    /// or a single node with a self-loop. Each cycle is rotated so the
    /// lexicographically smallest node comes first.
    pub fn find_cycles(&self, edge_types: Option<&[EdgeType]>) -> Vec<Vec<String>> {
        // Tarjan runs on a filtered copy so the edge-type filter does
        // not disturb the shared snapshot.
        let mut filtered: DiGraph<String, ()> = DiGraph::new();
        let mut map: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        for idx in self.inner.node_indices() {
            map.insert(idx, filtered.add_node(self.inner[idx].clone()));
        }
        for edge in self.inner.edge_references() {
            if edge_types.is_none_or(|kinds| kinds.contains(edge.weight())) {
                filtered.add_edge(map[&edge.source()], map[&edge.target()], ());
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&filtered)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|&n| filtered.find_edge(n, n).is_some())
            })
            .map(|scc| {
                let mut ids: Vec<String> = scc.iter().map(|&n| filtered[n].clone()).collect();
                rotate_to_min(&mut ids);
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// BFS shortest path with a depth cap. Ties broken by expanding
    /// neighbors in lexicographic order. Returns the full node chain
    /// including both endpoints, or `None` when unreachable.
    pub fn shortest_path(&self, from_id: &str, to_id: &str, max_depth: u32) -> Option<Vec<String>> {
        self.shortest_path_via(from_id, to_id, max_depth, None)
    }

    pub fn shortest_path_via(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: u32,
        edge_types: Option<&[EdgeType]>,
    ) -> Option<Vec<String>> {
        let &start = self.index.get(from_id)?;
        let &goal = self.index.get(to_id)?;
        if start == goal {
            return Some(vec![from_id.to_string()]);
        }

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(start, 0)]);
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.neighbors(current, Direction::Outgoing, edge_types) {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == goal {
                    let mut path = vec![goal];
                    let mut cursor = goal;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path.into_iter().map(|n| self.inner[n].clone()).collect());
                }
                queue.push_back((next, depth + 1));
            }
        }
        None
    }
}

impl Default for AlgoGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn rotate_to_min(ids: &mut Vec<String>) {
    if let Some(min_pos) = ids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
    {
        ids.rotate_left(min_pos);
    }
}
