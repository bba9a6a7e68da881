//! # Repository
//!
//! Persistent store of news items, scores, favorites, and execution logs,
//! behind a narrow async contract keyed by the uniqueness of `link`.
//!
//! `MemoryRepository` is the shipped implementation: an in-memory store under
//! a single process-wide lock (which gives per-link read-after-write
//! consistency for free), optionally snapshotted to a JSON file after each
//! mutation so separate `collect` / `serve` / `stats` invocations share state.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PersistenceError;
use crate::model::{ExecutionLog, Noticia, RawNews};
use crate::scoring::ScoreResult;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoStats {
    pub total_noticias: usize,
    pub noticias_favoritas: usize,
    pub por_fonte: HashMap<String, usize>,
    pub por_categoria: HashMap<String, usize>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert-or-update keyed by link. A second upsert of the same link
    /// refreshes titulo/fonte/data but never clears extracted text and never
    /// resets the favorite flag.
    async fn upsert_noticia(&self, raw: &RawNews) -> Result<Noticia, PersistenceError>;
    async fn get_noticia_by_link(&self, link: &str) -> Result<Option<Noticia>, PersistenceError>;
    async fn update_texto(
        &self,
        id: i64,
        texto: &str,
        palavras: usize,
    ) -> Result<(), PersistenceError>;
    async fn save_score(&self, id: i64, score: ScoreResult) -> Result<(), PersistenceError>;
    /// Newest first by publish date (collection timestamp for undated items);
    /// insertion order breaks ties.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Noticia>, PersistenceError>;
    /// Remove items whose reference date is older than `horizon`. Favorited
    /// items are never removed, regardless of age. Returns the removed count.
    async fn cleanup_older_than(&self, horizon: DateTime<Utc>) -> Result<usize, PersistenceError>;
    async fn save_execucao(&self, log: &ExecutionLog) -> Result<(), PersistenceError>;
    async fn last_execucao(&self) -> Result<Option<ExecutionLog>, PersistenceError>;
    async fn set_favorita(&self, id: i64, favorita: bool) -> Result<Noticia, PersistenceError>;
    async fn stats(&self) -> Result<RepoStats, PersistenceError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Store {
    next_id: i64,
    noticias: Vec<Noticia>,
    execucoes: Vec<ExecutionLog>,
    /// Link → id index, rebuilt on load.
    #[serde(skip)]
    by_link: HashMap<String, i64>,
}

impl Store {
    fn rebuild_index(&mut self) {
        self.by_link = self
            .noticias
            .iter()
            .map(|n| (n.link.clone(), n.id))
            .collect();
    }

    fn find_mut(&mut self, id: i64) -> Result<&mut Noticia, PersistenceError> {
        self.noticias
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(PersistenceError::NotFound { id })
    }
}

#[derive(Debug)]
pub struct MemoryRepository {
    inner: RwLock<Store>,
    snapshot: Option<PathBuf>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Purely in-memory store, no snapshot file. Used in tests.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Store {
                next_id: 1,
                ..Store::default()
            }),
            snapshot: None,
        }
    }

    /// Open a store backed by a JSON snapshot file. Loads existing state if
    /// the file is present; every mutation rewrites it (temp file + rename).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut store = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str::<Store>(&content)
                .map_err(|e| PersistenceError::Unavailable(format!("snapshot corrompido: {e}")))?
        } else {
            Store {
                next_id: 1,
                ..Store::default()
            }
        };
        store.rebuild_index();
        debug!(noticias = store.noticias.len(), path = %path.display(), "store aberto");
        Ok(Self {
            inner: RwLock::new(store),
            snapshot: Some(path),
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Store>, PersistenceError> {
        self.inner
            .read()
            .map_err(|_| PersistenceError::Unavailable("lock envenenado".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Store>, PersistenceError> {
        self.inner
            .write()
            .map_err(|_| PersistenceError::Unavailable("lock envenenado".to_string()))
    }

    fn persist(&self, store: &Store) -> Result<(), PersistenceError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(store)
            .map_err(|e| PersistenceError::Unavailable(format!("serializando snapshot: {e}")))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_noticia(&self, raw: &RawNews) -> Result<Noticia, PersistenceError> {
        let mut store = self.write()?;
        let result = if let Some(&id) = store.by_link.get(&raw.link) {
            let n = store.find_mut(id)?;
            n.titulo = raw.titulo.clone();
            n.fonte = raw.fonte.clone();
            if raw.data_publicacao.is_some() {
                n.data_publicacao = raw.data_publicacao;
            }
            // texto_completo, palavras, favorita and score survive recollection
            n.clone()
        } else {
            let id = store.next_id;
            store.next_id += 1;
            let n = Noticia {
                id,
                titulo: raw.titulo.clone(),
                fonte: raw.fonte.clone(),
                link: raw.link.clone(),
                data_publicacao: raw.data_publicacao,
                texto_completo: None,
                palavras: None,
                favorita: false,
                coletada_em: Utc::now(),
                score: None,
            };
            store.by_link.insert(n.link.clone(), id);
            store.noticias.push(n.clone());
            n
        };
        self.persist(&store)?;
        Ok(result)
    }

    async fn get_noticia_by_link(&self, link: &str) -> Result<Option<Noticia>, PersistenceError> {
        let store = self.read()?;
        let id = store.by_link.get(link).copied();
        Ok(id.and_then(|id| store.noticias.iter().find(|n| n.id == id).cloned()))
    }

    async fn update_texto(
        &self,
        id: i64,
        texto: &str,
        palavras: usize,
    ) -> Result<(), PersistenceError> {
        let mut store = self.write()?;
        let n = store.find_mut(id)?;
        n.texto_completo = Some(texto.to_string());
        n.palavras = Some(palavras);
        self.persist(&store)?;
        Ok(())
    }

    async fn save_score(&self, id: i64, score: ScoreResult) -> Result<(), PersistenceError> {
        let mut store = self.write()?;
        store.find_mut(id)?.score = Some(score);
        self.persist(&store)?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Noticia>, PersistenceError> {
        let store = self.read()?;
        let mut out = store.noticias.clone();
        // Stable sort keeps insertion order as the tie-break.
        out.sort_by(|a, b| b.data_referencia().cmp(&a.data_referencia()));
        out.truncate(limit);
        Ok(out)
    }

    async fn cleanup_older_than(&self, horizon: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut store = self.write()?;
        let before = store.noticias.len();
        store
            .noticias
            .retain(|n| n.favorita || n.data_referencia() >= horizon);
        let removed = before - store.noticias.len();
        if removed > 0 {
            store.rebuild_index();
        }
        self.persist(&store)?;
        Ok(removed)
    }

    async fn save_execucao(&self, log: &ExecutionLog) -> Result<(), PersistenceError> {
        let mut store = self.write()?;
        store.execucoes.push(log.clone());
        self.persist(&store)?;
        Ok(())
    }

    async fn last_execucao(&self) -> Result<Option<ExecutionLog>, PersistenceError> {
        Ok(self.read()?.execucoes.last().cloned())
    }

    async fn set_favorita(&self, id: i64, favorita: bool) -> Result<Noticia, PersistenceError> {
        let mut store = self.write()?;
        let n = store.find_mut(id)?;
        n.favorita = favorita;
        let out = n.clone();
        self.persist(&store)?;
        Ok(out)
    }

    async fn stats(&self) -> Result<RepoStats, PersistenceError> {
        let store = self.read()?;
        let mut stats = RepoStats {
            total_noticias: store.noticias.len(),
            ..RepoStats::default()
        };
        for n in &store.noticias {
            if n.favorita {
                stats.noticias_favoritas += 1;
            }
            *stats.por_fonte.entry(n.fonte.clone()).or_default() += 1;
            if let Some(score) = &n.score {
                for c in &score.categorias {
                    *stats.por_categoria.entry(c.clone()).or_default() += 1;
                }
            }
        }
        Ok(stats)
    }
}
