// src/model.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreResult;

/// One news item as yielded by a content source, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawNews {
    pub titulo: String,
    pub fonte: String, // e.g., "camara", "senado"
    pub link: String,  // unique, stable key across runs
    pub data_publicacao: Option<DateTime<Utc>>,
}

/// Persisted news item. `link` is the identity; everything else may be
/// refreshed by a later collection, except `favorita`, which only the user
/// flips, and `texto_completo`, which is never cleared once extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Noticia {
    pub id: i64,
    pub titulo: String,
    pub fonte: String,
    pub link: String,
    pub data_publicacao: Option<DateTime<Utc>>,
    pub texto_completo: Option<String>,
    pub palavras: Option<usize>,
    pub favorita: bool,
    pub coletada_em: DateTime<Utc>,
    pub score: Option<ScoreResult>,
}

impl Noticia {
    /// Reference date for retention: publish date when known, otherwise the
    /// collection timestamp, so undated items still age out.
    pub fn data_referencia(&self) -> DateTime<Utc> {
        self.data_publicacao.unwrap_or(self.coletada_em)
    }
}

/// Final status of one pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Wire value for stores that record a run before it finalizes; the
    /// pipeline itself writes a single record, at finalization.
    Started,
    Success,
    NoItems,
    Error,
}

/// One record per pipeline run. Finalized exactly once; never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionLog {
    pub data_execucao: DateTime<Utc>,
    pub status: RunStatus,
    pub noticias_coletadas: usize,
    pub noticias_processadas: usize,
    /// Elapsed wall time in seconds.
    pub tempo_execucao: f64,
    pub log_detalhes: HashMap<String, serde_json::Value>,
}
