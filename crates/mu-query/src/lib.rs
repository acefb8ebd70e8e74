//! MUQL — the relational + structural query language
//!
//! Pipeline: lex → parse → execute. Each stage returns either the
//! next stage's input or a [`QueryError`]; no stage panics on user
//! input.

pub mod ast;
pub mod engine;
pub mod lexer;
pub mod parser;

#[cfg(test)]
pub mod tests;

use serde::Serialize;
use thiserror::Error;

pub use engine::MuqlEngine;

/// Default row cap for non-aggregate SELECTs.
pub const DEFAULT_LIMIT: u64 = 1000;

/// Default traversal depth cap when none is given.
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Default query deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("syntax error at offset {offset}: expected {expected}")]
    Syntax { offset: usize, expected: String },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unresolved node: {0}")]
    UnresolvedNode(String),

    #[error("query exceeded its deadline")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Syntax { .. } => "syntax_error",
            QueryError::UnknownTable(_) => "unknown_table",
            QueryError::UnknownColumn(_) => "unknown_column",
            QueryError::UnresolvedNode(_) => "unresolved_node",
            QueryError::Timeout => "query_timeout",
            QueryError::Storage(_) => "storage_error",
        }
    }
}

impl From<mu_core::MuError> for QueryError {
    fn from(e: mu_core::MuError) -> Self {
        match e {
            mu_core::MuError::NotFound(what) => QueryError::UnresolvedNode(what),
            other => QueryError::Storage(other.to_string()),
        }
    }
}

/// Result of one query execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub execution_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn empty() -> Self {
        QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms: 0.0,
            error: None,
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
            execution_time_ms: 0.0,
            error: None,
        }
    }
}
