// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod repository;
pub mod scoring;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::dictionary::{DictionaryOrigin, TermDictionary, TermEntry};
pub use crate::error::{ConfigError, PersistenceError, PipelineError, SourceError};
pub use crate::model::{ExecutionLog, Noticia, RawNews, RunStatus};
pub use crate::pipeline::{Pipeline, PipelineConfig};
pub use crate::repository::{MemoryRepository, RepoStats, Repository};
pub use crate::scoring::{ScoreResult, Scorer};
pub use crate::sources::{rss::RssSource, ContentSource};
