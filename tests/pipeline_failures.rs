// tests/pipeline_failures.rs
//
// Partial-failure policy: a broken source degrades the run, a broken store
// aborts it — and the execution log is written either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use legis_clipping::error::{PersistenceError, PipelineError, SourceError};
use legis_clipping::{
    ContentSource, ExecutionLog, MemoryRepository, Noticia, Pipeline, PipelineConfig, RawNews,
    RepoStats, Repository, RunStatus, ScoreResult, Scorer, TermDictionary,
};

struct GoodSource;

#[async_trait]
impl ContentSource for GoodSource {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        Ok(vec![
            RawNews {
                titulo: "Notícia 1".to_string(),
                fonte: "camara".to_string(),
                link: "https://t/1".to_string(),
                data_publicacao: Some(Utc::now()),
            },
            RawNews {
                titulo: "Notícia 2".to_string(),
                fonte: "camara".to_string(),
                link: "https://t/2".to_string(),
                data_publicacao: Some(Utc::now()),
            },
        ])
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "camara"
    }
}

struct BrokenSource;

#[async_trait]
impl ContentSource for BrokenSource {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        Err(SourceError::Parse("feed fora do ar".to_string()))
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "senado"
    }
}

struct EmptySource;

#[async_trait]
impl ContentSource for EmptySource {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        Ok(Vec::new())
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "camara"
    }
}

/// Store whose writes fail as unavailable, but which still records execution
/// logs, so the error path's best-effort logging is observable.
#[derive(Default)]
struct UnavailableRepo {
    execucoes: Mutex<Vec<ExecutionLog>>,
}

#[async_trait]
impl Repository for UnavailableRepo {
    async fn upsert_noticia(&self, _raw: &RawNews) -> Result<Noticia, PersistenceError> {
        Err(PersistenceError::Unavailable("banco inacessível".to_string()))
    }
    async fn get_noticia_by_link(&self, _link: &str) -> Result<Option<Noticia>, PersistenceError> {
        Ok(None)
    }
    async fn update_texto(
        &self,
        _id: i64,
        _texto: &str,
        _palavras: usize,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
    async fn save_score(&self, _id: i64, _score: ScoreResult) -> Result<(), PersistenceError> {
        Ok(())
    }
    async fn list_recent(&self, _limit: usize) -> Result<Vec<Noticia>, PersistenceError> {
        Ok(Vec::new())
    }
    async fn cleanup_older_than(
        &self,
        _horizon: DateTime<Utc>,
    ) -> Result<usize, PersistenceError> {
        Ok(0)
    }
    async fn save_execucao(&self, log: &ExecutionLog) -> Result<(), PersistenceError> {
        self.execucoes.lock().unwrap().push(log.clone());
        Ok(())
    }
    async fn last_execucao(&self) -> Result<Option<ExecutionLog>, PersistenceError> {
        Ok(self.execucoes.lock().unwrap().last().cloned())
    }
    async fn set_favorita(&self, id: i64, _favorita: bool) -> Result<Noticia, PersistenceError> {
        Err(PersistenceError::NotFound { id })
    }
    async fn stats(&self) -> Result<RepoStats, PersistenceError> {
        Ok(RepoStats::default())
    }
}

fn pipeline_with(sources: Vec<Arc<dyn ContentSource>>, repo: Arc<dyn Repository>) -> Pipeline {
    pipeline_with_cfg(sources, repo, PipelineConfig::default())
}

fn pipeline_with_cfg(
    sources: Vec<Arc<dyn ContentSource>>,
    repo: Arc<dyn Repository>,
    cfg: PipelineConfig,
) -> Pipeline {
    let scorer = Scorer::new(Arc::new(TermDictionary::fallback()));
    Pipeline::new(sources, repo, scorer, cfg)
}

#[tokio::test]
async fn one_broken_source_does_not_abort_the_run() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let pipeline = pipeline_with(
        vec![Arc::new(GoodSource), Arc::new(BrokenSource)],
        repo.clone(),
    );

    let log = pipeline.run_once().await.expect("partial success");

    assert_eq!(log.status, RunStatus::Success);
    assert_eq!(log.noticias_coletadas, 2);
    assert_eq!(log.log_detalhes["salvas_banco"], 2);
    assert_eq!(
        log.log_detalhes["fontes_com_erro"],
        serde_json::json!(["senado"])
    );
    assert_eq!(repo.list_recent(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_collection_finalizes_as_no_items_and_still_logs() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let pipeline = pipeline_with(vec![Arc::new(EmptySource)], repo.clone());

    let log = pipeline.run_once().await.unwrap();

    assert_eq!(log.status, RunStatus::NoItems);
    assert_eq!(log.noticias_coletadas, 0);
    assert_eq!(log.noticias_processadas, 0);

    let ultima = repo.last_execucao().await.unwrap().unwrap();
    assert_eq!(ultima.status, RunStatus::NoItems);
}

#[tokio::test]
async fn unavailable_store_aborts_with_error_log_and_partial_counts() {
    let repo = Arc::new(UnavailableRepo::default());
    let pipeline = pipeline_with(vec![Arc::new(GoodSource)], repo.clone());

    let err = pipeline.run_once().await.expect_err("must abort");
    assert!(matches!(err, PipelineError::Persistence(_)));

    let log = repo.last_execucao().await.unwrap().expect("log still written");
    assert_eq!(log.status, RunStatus::Error);
    assert_eq!(log.noticias_coletadas, 2); // collect succeeded before the abort
    assert_eq!(log.log_detalhes["etapa"], "persistencia");
    assert!(log.log_detalhes["erro"]
        .as_str()
        .unwrap()
        .contains("banco inacessível"));
}

/// Collect sleeps long enough for a second run to arrive mid-flight.
struct SlowSource;

#[async_trait]
impl ContentSource for SlowSource {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Vec::new())
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "camara"
    }
}

#[tokio::test]
async fn second_concurrent_run_fails_fast_with_already_running() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let pipeline = Arc::new(pipeline_with(vec![Arc::new(SlowSource)], repo));

    let p2 = pipeline.clone();
    let (a, b) = tokio::join!(pipeline.run_once(), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        p2.run_once().await
    });

    assert!(a.is_ok());
    assert!(matches!(b, Err(PipelineError::AlreadyRunning)));
}

/// Collect never comes back within any reasonable limit.
struct StallingCollect;

#[async_trait]
impl ContentSource for StallingCollect {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "senado"
    }
}

#[tokio::test(start_paused = true)]
async fn collect_timeout_is_recorded_and_run_proceeds() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let cfg = PipelineConfig {
        timeout_secs: 1,
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_with_cfg(
        vec![Arc::new(GoodSource), Arc::new(StallingCollect)],
        repo.clone(),
        cfg,
    );

    let log = pipeline.run_once().await.expect("partial success");

    assert_eq!(log.status, RunStatus::Success);
    assert_eq!(log.noticias_coletadas, 2);
    assert_eq!(
        log.log_detalhes["fontes_com_erro"],
        serde_json::json!(["senado"])
    );
    assert_eq!(repo.list_recent(10).await.unwrap().len(), 2);
}

/// Collect answers instantly but text extraction never does.
struct StallingExtraction;

#[async_trait]
impl ContentSource for StallingExtraction {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        Ok(vec![RawNews {
            titulo: "Notícia lenta".to_string(),
            fonte: "camara".to_string(),
            link: "https://t/lenta".to_string(),
            data_publicacao: Some(Utc::now()),
        }])
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Some("nunca chega".to_string()))
    }
    fn name(&self) -> &str {
        "camara"
    }
}

#[tokio::test(start_paused = true)]
async fn extraction_timeout_leaves_text_null_and_scores_nothing() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let cfg = PipelineConfig {
        timeout_secs: 1,
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_with_cfg(vec![Arc::new(StallingExtraction)], repo.clone(), cfg);

    let log = pipeline.run_once().await.unwrap();

    assert_eq!(log.status, RunStatus::Success);
    assert_eq!(log.log_detalhes["textos_extraidos"], 0);
    assert_eq!(log.log_detalhes["scores_calculados"], 0);

    let n = repo
        .get_noticia_by_link("https://t/lenta")
        .await
        .unwrap()
        .unwrap();
    assert!(n.texto_completo.is_none());
    assert!(n.score.is_none());
}

/// Working store except retention cleanup, which fails with an error that is
/// neither per-item nor store-level.
struct CleanupFailsRepo(MemoryRepository);

#[async_trait]
impl Repository for CleanupFailsRepo {
    async fn upsert_noticia(&self, raw: &RawNews) -> Result<Noticia, PersistenceError> {
        self.0.upsert_noticia(raw).await
    }
    async fn get_noticia_by_link(&self, link: &str) -> Result<Option<Noticia>, PersistenceError> {
        self.0.get_noticia_by_link(link).await
    }
    async fn update_texto(
        &self,
        id: i64,
        texto: &str,
        palavras: usize,
    ) -> Result<(), PersistenceError> {
        self.0.update_texto(id, texto, palavras).await
    }
    async fn save_score(&self, id: i64, score: ScoreResult) -> Result<(), PersistenceError> {
        self.0.save_score(id, score).await
    }
    async fn list_recent(&self, limit: usize) -> Result<Vec<Noticia>, PersistenceError> {
        self.0.list_recent(limit).await
    }
    async fn cleanup_older_than(
        &self,
        _horizon: DateTime<Utc>,
    ) -> Result<usize, PersistenceError> {
        Err(PersistenceError::Snapshot(std::io::Error::other(
            "disco cheio",
        )))
    }
    async fn save_execucao(&self, log: &ExecutionLog) -> Result<(), PersistenceError> {
        self.0.save_execucao(log).await
    }
    async fn last_execucao(&self) -> Result<Option<ExecutionLog>, PersistenceError> {
        self.0.last_execucao().await
    }
    async fn set_favorita(&self, id: i64, favorita: bool) -> Result<Noticia, PersistenceError> {
        self.0.set_favorita(id, favorita).await
    }
    async fn stats(&self) -> Result<RepoStats, PersistenceError> {
        self.0.stats().await
    }
}

#[tokio::test]
async fn unclassified_cleanup_failure_aborts_as_fatal() {
    let repo = Arc::new(CleanupFailsRepo(MemoryRepository::new()));
    let pipeline = pipeline_with(vec![Arc::new(GoodSource)], repo.clone());

    let err = pipeline.run_once().await.expect_err("must abort");
    assert!(matches!(err, PipelineError::Fatal(_)));

    let log = repo.last_execucao().await.unwrap().expect("log still written");
    assert_eq!(log.status, RunStatus::Error);
    assert_eq!(log.log_detalhes["etapa"], "limpeza");
    assert!(log.log_detalhes["erro"]
        .as_str()
        .unwrap()
        .contains("disco cheio"));
}

/// Panics on the first collect, then behaves.
#[derive(Default)]
struct PanicsOnce(AtomicBool);

#[async_trait]
impl ContentSource for PanicsOnce {
    async fn collect(&self, _max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        if !self.0.swap(true, Ordering::SeqCst) {
            panic!("feed inesperado");
        }
        Ok(Vec::new())
    }
    async fn extract_text(&self, _link: &str) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
    fn name(&self) -> &str {
        "camara"
    }
}

#[tokio::test]
async fn run_lock_is_released_even_when_a_stage_panics() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let pipeline = Arc::new(pipeline_with(vec![Arc::new(PanicsOnce::default())], repo));

    let p = pipeline.clone();
    let joined = tokio::spawn(async move { p.run_once().await }).await;
    assert!(joined.is_err(), "first run must panic");

    // The advisory lock was released by the unwound run.
    let second = pipeline.run_once().await.unwrap();
    assert_eq!(second.status, RunStatus::NoItems);
}

#[tokio::test]
async fn all_sources_broken_means_no_items_not_error() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let pipeline = pipeline_with(vec![Arc::new(BrokenSource)], repo);

    let log = pipeline.run_once().await.unwrap();
    assert_eq!(log.status, RunStatus::NoItems);
    assert_eq!(
        log.log_detalhes["fontes_com_erro"],
        serde_json::json!(["senado"])
    );
}
