//! Persisted graph model: nodes, edges, and the stable id scheme

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::ParameterDef;

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    CSharp,
    Go,
    Rust,
    Java,
}

impl Lang {
    /// Resolve a language tag, accepting common aliases (`py`, `ts`,
    /// `rs`, ...). Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "python" | "py" | "pyi" => Some(Lang::Python),
            "typescript" | "ts" => Some(Lang::TypeScript),
            "tsx" => Some(Lang::Tsx),
            "javascript" | "js" | "mjs" | "cjs" => Some(Lang::JavaScript),
            "jsx" => Some(Lang::Jsx),
            "csharp" | "cs" | "c#" => Some(Lang::CSharp),
            "go" | "golang" => Some(Lang::Go),
            "rust" | "rs" => Some(Lang::Rust),
            "java" => Some(Lang::Java),
            _ => None,
        }
    }

    /// Detect language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Some(Lang::Python),
            Some("ts") => Some(Lang::TypeScript),
            Some("tsx") => Some(Lang::Tsx),
            Some("js") | Some("mjs") | Some("cjs") => Some(Lang::JavaScript),
            Some("jsx") => Some(Lang::Jsx),
            Some("cs") => Some(Lang::CSharp),
            Some("go") => Some(Lang::Go),
            Some("rs") => Some(Lang::Rust),
            Some("java") => Some(Lang::Java),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Python => "python",
            Lang::TypeScript => "typescript",
            Lang::Tsx => "tsx",
            Lang::JavaScript => "javascript",
            Lang::Jsx => "jsx",
            Lang::CSharp => "csharp",
            Lang::Go => "go",
            Lang::Rust => "rust",
            Lang::Java => "java",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Module,
    Class,
    Function,
    External,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Module => "module",
            NodeType::Class => "class",
            NodeType::Function => "function",
            NodeType::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module" => Some(NodeType::Module),
            "class" => Some(NodeType::Class),
            "function" => Some(NodeType::Function),
            "external" => Some(NodeType::External),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeType {
    Contains,
    Imports,
    Inherits,
    Calls,
    Uses,
}

impl EdgeType {
    pub const ALL: [EdgeType; 5] = [
        EdgeType::Contains,
        EdgeType::Imports,
        EdgeType::Inherits,
        EdgeType::Calls,
        EdgeType::Uses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Inherits => "INHERITS",
            EdgeType::Calls => "CALLS",
            EdgeType::Uses => "USES",
        }
    }

    /// Case-insensitive parse (`imports`, `IMPORTS`, `Imports`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONTAINS" => Some(EdgeType::Contains),
            "IMPORTS" => Some(EdgeType::Imports),
            "INHERITS" => Some(EdgeType::Inherits),
            "CALLS" => Some(EdgeType::Calls),
            "USES" => Some(EdgeType::Uses),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload stored in the node `properties` column.
///
/// Serialized to JSON with a `kind` tag. Language-specific extras that
/// have no typed field land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeProperties {
    Module {
        language: Lang,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        docstring: Option<String>,
        total_lines: u32,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: BTreeMap<String, serde_json::Value>,
    },
    Class {
        #[serde(default)]
        bases: Vec<String>,
        #[serde(default)]
        decorators: Vec<String>,
        #[serde(default)]
        attributes: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        docstring: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: BTreeMap<String, serde_json::Value>,
    },
    Function {
        #[serde(default)]
        decorators: Vec<String>,
        #[serde(default)]
        parameters: Vec<ParameterDef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_type: Option<String>,
        is_async: bool,
        is_method: bool,
        is_static: bool,
        is_classmethod: bool,
        is_property: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        docstring: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_source: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: BTreeMap<String, serde_json::Value>,
    },
    External {
        /// Package or module root the workspace does not contain.
        package: String,
    },
}

impl NodeProperties {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A persisted node in the code graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable string id (`mod:src/a.py`, `cls:src/a.py:X`, ...).
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub qualified_name: Option<String>,
    /// Workspace-relative, forward slashes. Empty for external nodes.
    pub file_path: String,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub properties: NodeProperties,
    /// McCabe count for functions/methods; 0 for bodyless nodes.
    pub complexity: u32,
}

impl Node {
    /// Fields that participate in change detection during incremental
    /// updates. Id equality is assumed by the caller.
    pub fn fingerprint_eq(&self, other: &Node) -> bool {
        self.name == other.name
            && self.qualified_name == other.qualified_name
            && self.line_start == other.line_start
            && self.line_end == other.line_end
            && self.complexity == other.complexity
            && self.properties == other.properties
    }
}

/// A persisted directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub properties: EdgeProperties,
}

impl Edge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, edge_type: EdgeType) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        Edge {
            id: edge_id(&source_id, &target_id, edge_type),
            source_id,
            target_id,
            edge_type,
            properties: EdgeProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: EdgeProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Structured edge payload; defaults serialize to an empty object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeProperties {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_dynamic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl EdgeProperties {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ── Node id scheme ───────────────────────────────────────
//
// node-id = kind ":" ( path | ext-name ) [ ":" local ]
// Names are used verbatim; parsing splits on the first two colons and
// the first dot of the local part, so class/function names containing
// those characters are not supported as id round-trips.

pub fn module_id(rel_path: &str) -> String {
    format!("mod:{rel_path}")
}

pub fn class_id(rel_path: &str, class_name: &str) -> String {
    format!("cls:{rel_path}:{class_name}")
}

pub fn function_id(rel_path: &str, function_name: &str) -> String {
    format!("fn:{rel_path}:{function_name}")
}

pub fn method_id(rel_path: &str, class_name: &str, method_name: &str) -> String {
    format!("fn:{rel_path}:{class_name}.{method_name}")
}

pub fn external_id(package: &str) -> String {
    format!("ext:{package}")
}

/// Deterministic edge id derived from the endpoints and edge type.
pub fn edge_id(source_id: &str, target_id: &str, edge_type: EdgeType) -> String {
    format!("{}:{source_id}->{target_id}", edge_type.as_str())
}

/// Split a node id into `(kind, path-or-name, local)`.
pub fn parse_node_id(id: &str) -> Option<(&str, &str, Option<&str>)> {
    let (kind, rest) = id.split_once(':')?;
    match kind {
        "mod" | "ext" => Some((kind, rest, None)),
        "cls" | "fn" => match rest.split_once(':') {
            Some((path, local)) => Some((kind, path, Some(local))),
            None => Some((kind, rest, None)),
        },
        _ => None,
    }
}

/// True when the string looks like a full node id rather than a name.
pub fn is_node_id(s: &str) -> bool {
    s.starts_with("mod:") || s.starts_with("cls:") || s.starts_with("fn:") || s.starts_with("ext:")
}
