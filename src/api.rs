// src/api.rs
// Thin JSON adapters over Repository + dictionary. Scores come from the
// store as persisted by the pipeline's scoring stage; nothing is recomputed
// on read. Failures surface as HTTP 500 with an `{"error": ...}` body.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::dictionary::TermDictionary;
use crate::model::Noticia;
use crate::repository::Repository;

const LISTING_LIMIT: usize = 100;
const RESUMO_CHARS: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub dictionary: Arc<TermDictionary>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/noticias", get(noticias))
        .route("/api/noticias/{id}/favoritar", post(favoritar))
        .route("/api/categorias", get(categorias))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// 500 + `{"error": ...}` envelope for anything a handler can't recover.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Clipping Legislativo",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.repo.stats().await?;
    let ultima = state.repo.last_execucao().await?;
    Ok(Json(json!({
        "sistema": "operacional",
        "total_noticias": stats.total_noticias,
        "noticias_favoritas": stats.noticias_favoritas,
        "por_fonte": stats.por_fonte,
        "dicionario": {
            "termos": state.dictionary.len(),
            "origem": state.dictionary.origin(),
        },
        "ultima_execucao": ultima,
    })))
}

#[derive(serde::Deserialize)]
struct NoticiasQuery {
    #[serde(default)]
    ordenacao: Option<String>,
}

#[derive(serde::Serialize)]
struct NoticiaOut {
    id: i64,
    titulo: String,
    fonte: String,
    link: String,
    data_publicacao: Option<DateTime<Utc>>,
    resumo: Option<String>,
    favorita: bool,
    score_interesse: u32,
    score_risco: u32,
    score_total: u32,
    categorias: Vec<String>,
}

impl NoticiaOut {
    fn from_noticia(n: Noticia) -> Self {
        let resumo = n.texto_completo.as_deref().map(resumo);
        let score = n.score.unwrap_or_default();
        Self {
            id: n.id,
            titulo: n.titulo,
            fonte: n.fonte,
            link: n.link,
            data_publicacao: n.data_publicacao,
            resumo,
            favorita: n.favorita,
            score_interesse: score.score_interesse,
            score_risco: score.score_risco,
            score_total: score.score_total(),
            categorias: score.categorias,
        }
    }
}

/// First 200 chars of the full text, char-safe.
fn resumo(texto: &str) -> String {
    if texto.chars().count() <= RESUMO_CHARS {
        texto.to_string()
    } else {
        let cut: String = texto.chars().take(RESUMO_CHARS).collect();
        format!("{cut}...")
    }
}

async fn noticias(
    State(state): State<AppState>,
    Query(q): Query<NoticiasQuery>,
) -> Result<Json<Value>, ApiError> {
    let recentes = state.repo.list_recent(LISTING_LIMIT).await?;
    let mut out: Vec<NoticiaOut> = recentes.into_iter().map(NoticiaOut::from_noticia).collect();

    // `list_recent` is already newest-first; the score orderings re-sort
    // stably, so collection order remains the tie-break.
    match q.ordenacao.as_deref().unwrap_or("data") {
        "score" => out.sort_by(|a, b| b.score_total.cmp(&a.score_total)),
        "interesse" => out.sort_by(|a, b| b.score_interesse.cmp(&a.score_interesse)),
        "risco" => out.sort_by(|a, b| b.score_risco.cmp(&a.score_risco)),
        _ => {}
    }

    let total = out.len();
    Ok(Json(json!({
        "noticias": out,
        "total": total,
        "dicionario_termos": state.dictionary.len(),
    })))
}

async fn favoritar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.repo.set_favorita(id, true).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Notícia {id} favoritada!"),
    })))
}

async fn categorias(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "categorias": state.dictionary.categorias() }))
}
