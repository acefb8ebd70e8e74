//! MUQL abstract syntax

use mu_core::NodeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Nodes,
    Modules,
    Classes,
    Functions,
    Edges,
}

impl Table {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nodes" => Some(Table::Nodes),
            "modules" => Some(Table::Modules),
            "classes" => Some(Table::Classes),
            "functions" => Some(Table::Functions),
            "edges" => Some(Table::Edges),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::Modules => "modules",
            Table::Classes => "classes",
            Table::Functions => "functions",
            Table::Edges => "edges",
        }
    }

    /// The node-type filter for the filtered views of `nodes`.
    pub fn node_type(&self) -> Option<NodeType> {
        match self {
            Table::Modules => Some(NodeType::Module),
            Table::Classes => Some(NodeType::Class),
            Table::Functions => Some(NodeType::Function),
            Table::Nodes | Table::Edges => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Columns {
    All,
    Named(Vec<String>),
    CountStar,
    Avg(String),
    Sum(String),
}

impl Columns {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Columns::CountStar | Columns::Avg(_) | Columns::Sum(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CmpOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Cmp {
        column: String,
        op: CmpOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub columns: Columns,
    pub table: Table,
    pub condition: Option<Cond>,
    pub order_by: Option<(String, bool)>, // (column, descending)
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowRelation {
    Dependencies,
    Dependents,
    Children,
    Callers,
    Callees,
    Impact,
    Ancestors,
}

impl ShowRelation {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "dependencies" => Some(ShowRelation::Dependencies),
            "dependents" => Some(ShowRelation::Dependents),
            "children" => Some(ShowRelation::Children),
            "callers" => Some(ShowRelation::Callers),
            "callees" => Some(ShowRelation::Callees),
            "impact" => Some(ShowRelation::Impact),
            "ancestors" => Some(ShowRelation::Ancestors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowQuery {
    pub relation: ShowRelation,
    pub node_ref: String,
    pub depth: Option<u32>,
    pub via: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeKind {
    Complexity,
    Hotspots,
    Circular,
    Impact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Show(ShowQuery),
    FindMatching { table: Table, pattern: String },
    FindCalling { table: Table, node_ref: String },
    FindWithDecorator { table: Table, decorator: String },
    FindImporting { table: Table, node_ref: String },
    FindCycles { edge_type: Option<String> },
    Path {
        from: String,
        to: String,
        max_depth: Option<u32>,
        via: Option<String>,
    },
    Analyze {
        kind: AnalyzeKind,
        node_ref: Option<String>,
    },
    /// `DESCRIBE tables` when `None`.
    Describe(Option<Table>),
}
