// src/sources/rss.rs
// Generic RSS 2.0 content source. The two legislative presets point at the
// public feeds; fixture mode feeds canned XML and article texts for tests and
// offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};
use tracing::warn;

use crate::error::SourceError;
use crate::model::RawNews;
use crate::sources::{normalize_html, ContentSource};

const DEFAULT_CAMARA_FEED: &str = "https://www.camara.leg.br/noticias/rss";
const DEFAULT_SENADO_FEED: &str = "https://www12.senado.leg.br/noticias/feed/noticias";

/// How many feed items one "page" is worth; `collect(max_pages)` caps the
/// batch at `max_pages * ITEMS_PER_PAGE`.
const ITEMS_PER_PAGE: usize = 20;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

pub struct RssSource {
    nome: String,
    mode: Mode,
}

enum Mode {
    Fixture {
        xml: String,
        textos: HashMap<String, String>,
    },
    Http {
        feed_url: String,
        client: reqwest::Client,
    },
}

impl RssSource {
    pub fn from_url(nome: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            nome: nome.into(),
            mode: Mode::Http {
                feed_url: feed_url.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    pub fn from_fixture(nome: impl Into<String>, xml: &str) -> Self {
        Self {
            nome: nome.into(),
            mode: Mode::Fixture {
                xml: xml.to_string(),
                textos: HashMap::new(),
            },
        }
    }

    /// Register a canned article text for `extract_text` in fixture mode.
    pub fn with_fixture_texto(mut self, link: &str, texto: &str) -> Self {
        if let Mode::Fixture { textos, .. } = &mut self.mode {
            textos.insert(link.to_string(), texto.to_string());
        }
        self
    }

    /// Câmara dos Deputados news feed; `CAMARA_FEED_URL` overrides the URL.
    pub fn camara() -> Self {
        let url =
            std::env::var("CAMARA_FEED_URL").unwrap_or_else(|_| DEFAULT_CAMARA_FEED.to_string());
        Self::from_url("camara", url)
    }

    /// Senado Federal news feed; `SENADO_FEED_URL` overrides the URL.
    pub fn senado() -> Self {
        let url =
            std::env::var("SENADO_FEED_URL").unwrap_or_else(|_| DEFAULT_SENADO_FEED.to_string());
        Self::from_url("senado", url)
    }

    fn parse_items(&self, xml: &str) -> Result<Vec<RawNews>, SourceError> {
        let rss: Rss = from_str(xml).map_err(|e| SourceError::Parse(e.to_string()))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            // Items without link or title are unusable; skip, don't fail.
            let (Some(link), Some(titulo)) = (it.link, it.title) else {
                continue;
            };
            let titulo = titulo.trim().to_string();
            if titulo.is_empty() || link.trim().is_empty() {
                continue;
            }
            out.push(RawNews {
                titulo,
                fonte: self.nome.clone(),
                link: link.trim().to_string(),
                data_publicacao: it.pub_date.as_deref().and_then(parse_rfc2822),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ContentSource for RssSource {
    async fn collect(&self, max_pages: u32) -> Result<Vec<RawNews>, SourceError> {
        let xml = match &self.mode {
            Mode::Fixture { xml, .. } => xml.clone(),
            Mode::Http { feed_url, client } => {
                let resp = client.get(feed_url).send().await?.error_for_status()?;
                resp.text().await?
            }
        };
        let mut items = self.parse_items(&xml)?;
        items.truncate(max_pages as usize * ITEMS_PER_PAGE);
        Ok(items)
    }

    async fn extract_text(&self, link: &str) -> Result<Option<String>, SourceError> {
        let raw = match &self.mode {
            Mode::Fixture { textos, .. } => match textos.get(link) {
                Some(t) => t.clone(),
                None => return Ok(None),
            },
            Mode::Http { client, .. } => {
                let resp = match client.get(link).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, link, fonte = %self.nome, "falha ao buscar artigo");
                        return Ok(None);
                    }
                };
                if !resp.status().is_success() {
                    return Ok(None);
                }
                resp.text().await?
            }
        };
        let texto = normalize_html(&raw);
        Ok((!texto.is_empty()).then_some(texto))
    }

    fn name(&self) -> &str {
        &self.nome
    }
}
