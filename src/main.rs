//! Clipping Legislativo — Binary Entrypoint
//! Wires the collection pipeline, the store, and the Axum HTTP API behind a
//! small CLI: `serve`, `collect`, `stats`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use legis_clipping::{
    api, AppConfig, AppState, ContentSource, MemoryRepository, Pipeline, Repository, RssSource,
    Scorer, TermDictionary,
};

#[derive(Parser)]
#[command(name = "legis-clipping", version, about = "Clipping legislativo: coleta, scoring e API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API, optionally collecting in the background
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Minutes between background collection runs (0 disables)
        #[arg(long, default_value_t = 0)]
        interval_min: u64,
    },
    /// Run one full collection now
    Collect {
        /// Pages per source (overrides config)
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Print repository statistics
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("legis_clipping=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = AppConfig::load().context("carregando configuração")?;

    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::open(&cfg.db_path)?);
    let dictionary = Arc::new(TermDictionary::load_or_fallback(&cfg.dicionario_path));

    match cli.command {
        Command::Serve { port, interval_min } => {
            if interval_min > 0 {
                let pipeline = Arc::new(build_pipeline(
                    &cfg,
                    repo.clone(),
                    dictionary.clone(),
                    None,
                ));
                spawn_collection_ticker(pipeline, interval_min);
            }
            let state = AppState {
                repo,
                dictionary,
            };
            let router = api::create_router(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            info!(port, "API disponível");
            axum::serve(listener, router).await?;
        }
        Command::Collect { pages } => {
            let pipeline = build_pipeline(&cfg, repo, dictionary, pages);
            let log = pipeline.run_once().await?;
            info!(
                status = ?log.status,
                coletadas = log.noticias_coletadas,
                processadas = log.noticias_processadas,
                "coleta concluída"
            );
        }
        Command::Stats => {
            let stats = repo.stats().await?;
            println!("Total de notícias: {}", stats.total_noticias);
            println!("Notícias favoritas: {}", stats.noticias_favoritas);
            if !stats.por_fonte.is_empty() {
                println!("Por fonte:");
                for (fonte, n) in &stats.por_fonte {
                    println!("  {fonte}: {n}");
                }
            }
            if !stats.por_categoria.is_empty() {
                println!("Por categoria:");
                for (categoria, n) in &stats.por_categoria {
                    println!("  {categoria}: {n}");
                }
            }
        }
    }

    Ok(())
}

fn build_pipeline(
    cfg: &AppConfig,
    repo: Arc<dyn Repository>,
    dictionary: Arc<TermDictionary>,
    pages: Option<u32>,
) -> Pipeline {
    let mut pcfg = cfg.pipeline_config();
    if let Some(p) = pages {
        pcfg.max_pages = p;
    }
    let sources: Vec<Arc<dyn ContentSource>> = cfg
        .fontes
        .iter()
        .map(|f| Arc::new(RssSource::from_url(&f.nome, &f.feed_url)) as Arc<dyn ContentSource>)
        .collect();
    Pipeline::new(sources, repo, Scorer::new(dictionary), pcfg)
}

/// Background collection in the serving process. The first tick fires
/// immediately, then every `interval_min` minutes.
fn spawn_collection_ticker(pipeline: Arc<Pipeline>, interval_min: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_min * 60));
        loop {
            ticker.tick().await;
            match pipeline.run_once().await {
                Ok(log) => info!(
                    status = ?log.status,
                    coletadas = log.noticias_coletadas,
                    "coleta em segundo plano concluída"
                ),
                Err(e) => warn!(error = %e, "coleta em segundo plano falhou"),
            }
        }
    });
}
