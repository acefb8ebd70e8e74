//! Change and graph event types flowing through the update pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::NodeType;

/// What happened to a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One debounced filesystem change delivered to the update worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Kind of graph mutation broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventKind {
    NodeAdded,
    NodeModified,
    NodeRemoved,
}

/// Event published after a change set commits. The shape is a wire
/// contract consumed by daemon clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEvent {
    #[serde(rename = "type")]
    pub kind: GraphEventKind,
    pub node_id: String,
    pub node_type: NodeType,
    pub file_path: String,
    /// Monotonic version of the commit that produced this event.
    pub version: u64,
}

impl GraphEvent {
    pub fn new(kind: GraphEventKind, node_id: impl Into<String>, node_type: NodeType, file_path: impl Into<String>) -> Self {
        GraphEvent {
            kind,
            node_id: node_id.into(),
            node_type,
            file_path: file_path.into(),
            version: 0,
        }
    }
}
