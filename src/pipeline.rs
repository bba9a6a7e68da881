//! # Collection Pipeline
//!
//! Drives one end-to-end run: collect from every source, persist raw items,
//! extract full text, score, clean up old items, and record one execution log.
//!
//! Stages run strictly in order because each depends on the previous stage's
//! side effects; within a stage, per-item work runs on a bounded pool. A
//! failure in one source or one item never aborts the run (partial-success
//! policy); a store-level failure or any unclassified error does, with the
//! execution log still written best-effort before the error is returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::{PersistenceError, PipelineError};
use crate::model::{ExecutionLog, RawNews, RunStatus};
use crate::repository::Repository;
use crate::scoring::Scorer;
use crate::sources::ContentSource;

/// One-time metrics registration (so series show up with descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("clipping_runs_total", "Total pipeline runs.");
        describe_counter!("clipping_collected_total", "News items collected from sources.");
        describe_counter!("clipping_saved_total", "News items upserted into the store.");
        describe_counter!("clipping_extracted_total", "Items with full text extracted.");
        describe_counter!("clipping_scored_total", "Items scored against the dictionary.");
        describe_counter!("clipping_cleaned_total", "Old items removed by retention cleanup.");
        describe_counter!("clipping_source_errors_total", "Source collect failures/timeouts.");
        describe_gauge!("clipping_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pages requested from each source per run.
    pub max_pages: u32,
    /// Most-recent window considered by the scoring stage.
    pub score_batch_limit: usize,
    /// Items older than this (and not favorited) are removed.
    pub retention_days: i64,
    /// Bounded pool size for per-item extraction.
    pub concurrency: usize,
    /// Per-source collect and per-item extraction timeout.
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            score_batch_limit: 1000,
            retention_days: 30,
            concurrency: 4,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Coleta,
    Persistencia,
    Extracao,
    Scoring,
    Limpeza,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Coleta => "coleta",
            Stage::Persistencia => "persistencia",
            Stage::Extracao => "extracao",
            Stage::Scoring => "scoring",
            Stage::Limpeza => "limpeza",
        }
    }
}

enum Outcome {
    Completed,
    NoItems,
}

/// Clears the run flag on drop, so a panicking stage cannot leave the
/// advisory lock held.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Store-level unavailability keeps its persistence classification; any other
/// failure on a stage-wide repository call is unexpected there and aborts as
/// fatal.
fn classify(etapa: Stage, err: PersistenceError) -> (Stage, PipelineError) {
    match err {
        e @ PersistenceError::Unavailable(_) => (etapa, e.into()),
        other => (etapa, PipelineError::Fatal(other.to_string())),
    }
}

/// Per-stage tallies, kept even when a later stage faults.
#[derive(Debug, Default)]
struct RunCounts {
    coletadas: usize,
    por_fonte: Vec<(String, usize)>,
    fontes_com_erro: Vec<String>,
    salvas: usize,
    extraidas: usize,
    pontuadas: usize,
    removidas: usize,
}

pub struct Pipeline {
    sources: Vec<Arc<dyn ContentSource>>,
    repo: Arc<dyn Repository>,
    scorer: Scorer,
    cfg: PipelineConfig,
    /// Advisory lock: one run at a time per process.
    ativo: AtomicBool,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Arc<dyn ContentSource>>,
        repo: Arc<dyn Repository>,
        scorer: Scorer,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            sources,
            repo,
            scorer,
            cfg,
            ativo: AtomicBool::new(false),
        }
    }

    /// Run the full pipeline once. Returns the finalized execution log, or the
    /// aborting error after the log has been written with status `error`.
    pub async fn run_once(&self) -> Result<ExecutionLog, PipelineError> {
        ensure_metrics_described();
        if self
            .ativo
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }

        let _guarda = RunGuard(&self.ativo);

        let inicio = Instant::now();
        let data_execucao = Utc::now();
        info!("iniciando coleta completa");

        let mut counts = RunCounts::default();
        let resultado = self.execute(&mut counts).await;

        let tempo = inicio.elapsed().as_secs_f64();
        let log = match &resultado {
            Ok(Outcome::Completed) => {
                self.montar_log(&counts, RunStatus::Success, tempo, data_execucao, None)
            }
            Ok(Outcome::NoItems) => {
                warn!("nenhuma notícia coletada");
                self.montar_log(&counts, RunStatus::NoItems, tempo, data_execucao, None)
            }
            Err((etapa, err)) => {
                self.montar_log(&counts, RunStatus::Error, tempo, data_execucao, Some((*etapa, err)))
            }
        };

        // Best-effort: a failing log write never masks the run result.
        if let Err(e) = self.repo.save_execucao(&log).await {
            warn!(error = %e, "falha ao salvar log de execução");
        }

        counter!("clipping_runs_total").increment(1);
        counter!("clipping_collected_total").increment(counts.coletadas as u64);
        counter!("clipping_saved_total").increment(counts.salvas as u64);
        counter!("clipping_extracted_total").increment(counts.extraidas as u64);
        counter!("clipping_scored_total").increment(counts.pontuadas as u64);
        counter!("clipping_cleaned_total").increment(counts.removidas as u64);
        gauge!("clipping_last_run_ts").set(data_execucao.timestamp().max(0) as f64);

        match resultado {
            Ok(_) => {
                info!(
                    status = ?log.status,
                    coletadas = counts.coletadas,
                    salvas = counts.salvas,
                    extraidas = counts.extraidas,
                    pontuadas = counts.pontuadas,
                    removidas = counts.removidas,
                    tempo_s = %format!("{tempo:.1}"),
                    "coleta completa finalizada"
                );
                Ok(log)
            }
            Err((etapa, err)) => {
                error!(etapa = etapa.as_str(), error = %err, "erro na coleta completa");
                Err(err)
            }
        }
    }

    async fn execute(&self, counts: &mut RunCounts) -> Result<Outcome, (Stage, PipelineError)> {
        let limite = Duration::from_secs(self.cfg.timeout_secs);

        // --- Coleta: all sources concurrently; per-source failures recorded,
        // never fatal.
        let coletas = futures::future::join_all(self.sources.iter().map(|s| async move {
            let nome = s.name().to_string();
            let res = tokio::time::timeout(limite, s.collect(self.cfg.max_pages)).await;
            (nome, res)
        }))
        .await;

        let mut candidatas: Vec<RawNews> = Vec::new();
        for (nome, res) in coletas {
            match res {
                Ok(Ok(items)) => {
                    info!(fonte = %nome, coletadas = items.len(), "fonte coletada");
                    counts.por_fonte.push((nome, items.len()));
                    candidatas.extend(items);
                }
                Ok(Err(e)) => {
                    warn!(fonte = %nome, error = %e, "falha na coleta da fonte");
                    counter!("clipping_source_errors_total").increment(1);
                    counts.fontes_com_erro.push(nome);
                }
                Err(_) => {
                    warn!(fonte = %nome, "coleta excedeu o tempo limite");
                    counter!("clipping_source_errors_total").increment(1);
                    counts.fontes_com_erro.push(nome);
                }
            }
        }
        counts.coletadas = candidatas.len();
        if candidatas.is_empty() {
            return Ok(Outcome::NoItems);
        }

        // --- Persistência: upsert by link; per-item failures skipped, a
        // store-level failure aborts.
        for raw in &candidatas {
            match self.repo.upsert_noticia(raw).await {
                Ok(_) => counts.salvas += 1,
                Err(e @ PersistenceError::Unavailable(_)) => {
                    return Err((Stage::Persistencia, e.into()))
                }
                Err(e) => warn!(link = %raw.link, error = %e, "falha ao salvar notícia"),
            }
        }

        // --- Extração: bounded pool with per-item timeout; the write-back
        // (re-read by link, then update) happens after the fetches so each
        // link's read-then-write stays on the repository's consistency.
        let tarefas: Vec<_> = candidatas
            .iter()
            .map(|raw| {
                let fonte = self.source_named(&raw.fonte);
                let link = raw.link.clone();
                async move {
                    let Some(src) = fonte else {
                        return (link, None);
                    };
                    match tokio::time::timeout(limite, src.extract_text(&link)).await {
                        Ok(Ok(texto)) => (link, texto.filter(|t| !t.is_empty())),
                        Ok(Err(e)) => {
                            warn!(link = %link, error = %e, "falha na extração de texto");
                            (link, None)
                        }
                        Err(_) => {
                            warn!(link = %link, "extração excedeu o tempo limite");
                            (link, None)
                        }
                    }
                }
            })
            .collect();
        let extraidos: Vec<(String, Option<String>)> = stream::iter(tarefas)
            .buffer_unordered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        for (link, texto) in extraidos {
            let Some(texto) = texto else { continue };
            match self.repo.get_noticia_by_link(&link).await {
                Ok(Some(n)) => {
                    let palavras = texto.split_whitespace().count();
                    match self.repo.update_texto(n.id, &texto, palavras).await {
                        Ok(()) => counts.extraidas += 1,
                        Err(e) => warn!(link = %link, error = %e, "falha ao gravar texto"),
                    }
                }
                Ok(None) => {} // item never made it into the store
                Err(e @ PersistenceError::Unavailable(_)) => {
                    return Err((Stage::Extracao, e.into()))
                }
                Err(e) => warn!(link = %link, error = %e, "falha ao reler notícia"),
            }
        }

        // --- Scoring: persisted scores are authoritative; the API never
        // recomputes on read.
        let recentes = self
            .repo
            .list_recent(self.cfg.score_batch_limit)
            .await
            .map_err(|e| classify(Stage::Scoring, e))?;
        for n in recentes {
            let Some(texto) = n.texto_completo.as_deref() else {
                continue;
            };
            let score = self.scorer.score(&n.titulo, texto);
            match self.repo.save_score(n.id, score).await {
                Ok(()) => counts.pontuadas += 1,
                Err(e) => warn!(id = n.id, error = %e, "falha ao salvar score"),
            }
        }

        // --- Limpeza: retention horizon, favorites exempt.
        let horizonte = Utc::now() - chrono::Duration::days(self.cfg.retention_days);
        counts.removidas = self
            .repo
            .cleanup_older_than(horizonte)
            .await
            .map_err(|e| classify(Stage::Limpeza, e))?;

        Ok(Outcome::Completed)
    }

    fn source_named(&self, nome: &str) -> Option<Arc<dyn ContentSource>> {
        self.sources.iter().find(|s| s.name() == nome).cloned()
    }

    fn montar_log(
        &self,
        counts: &RunCounts,
        status: RunStatus,
        tempo: f64,
        data_execucao: chrono::DateTime<Utc>,
        erro: Option<(Stage, &PipelineError)>,
    ) -> ExecutionLog {
        let mut detalhes = std::collections::HashMap::new();
        for (fonte, n) in &counts.por_fonte {
            detalhes.insert(format!("{fonte}_coletadas"), json!(n));
        }
        if !counts.fontes_com_erro.is_empty() {
            detalhes.insert("fontes_com_erro".to_string(), json!(counts.fontes_com_erro));
        }
        detalhes.insert("salvas_banco".to_string(), json!(counts.salvas));
        detalhes.insert("textos_extraidos".to_string(), json!(counts.extraidas));
        detalhes.insert("scores_calculados".to_string(), json!(counts.pontuadas));
        detalhes.insert("limpeza_antigas".to_string(), json!(counts.removidas));
        detalhes.insert(
            "dicionario_origem".to_string(),
            json!(self.scorer.dictionary().origin()),
        );
        if let Some((etapa, err)) = erro {
            detalhes.insert("etapa".to_string(), json!(etapa.as_str()));
            detalhes.insert("erro".to_string(), json!(err.to_string()));
        }

        ExecutionLog {
            data_execucao,
            status,
            noticias_coletadas: counts.coletadas,
            noticias_processadas: counts.pontuadas,
            tempo_execucao: tempo,
            log_detalhes: detalhes,
        }
    }
}
