// src/error.rs
// Error taxonomy for the clipping core. Config problems are recovered via the
// dictionary fallback; source and per-item persistence failures stay local to
// the item; store-level failures and anything unclassified abort the run after
// the execution log is written.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} line {line}: {reason}")]
    InvalidEntry {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("parsing {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("feed parse: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("noticia {id} not found")]
    NotFound { id: i64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot io: {0}")]
    Snapshot(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a collection run is already active")]
    AlreadyRunning,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{0}")]
    Fatal(String),
}
