//! Error kinds shared across the engine

use thiserror::Error;

/// Core error type. Every kind maps onto a CLI exit code and an HTTP
/// status in the daemon.
#[derive(Debug, Error)]
pub enum MuError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("schema version mismatch: found {found}, expected {expected}")]
    Schema { found: String, expected: String },

    #[error("store is locked by pid {pid}")]
    Lock { pid: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("scan error at {path}: {kind}")]
    Scan { path: String, kind: String },

    #[error("worker error: {0}")]
    Worker(String),

    #[error("daemon unavailable: {0}")]
    DaemonUnavailable(String),
}

impl MuError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        MuError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MuError::Io { .. } => "io_error",
            MuError::Parse { .. } => "parse_error",
            MuError::UnsupportedLanguage(_) => "unsupported_language",
            MuError::Schema { .. } => "schema_error",
            MuError::Lock { .. } => "lock_error",
            MuError::NotFound(_) => "not_found",
            MuError::Storage(_) => "storage_error",
            MuError::Scan { .. } => "scan_error",
            MuError::Worker(_) => "worker_error",
            MuError::DaemonUnavailable(_) => "daemon_unavailable",
        }
    }
}
