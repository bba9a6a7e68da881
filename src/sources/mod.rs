// src/sources/mod.rs
pub mod rss;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::model::RawNews;

/// Narrow contract the pipeline collects from. One implementation per named
/// source (e.g. "camara", "senado").
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// A finite batch of news items. Malformed individual entries are skipped,
    /// never surfaced as errors; partial results are fine.
    async fn collect(&self, max_pages: u32) -> Result<Vec<RawNews>, SourceError>;

    /// Full article text for a link, `None` when unreachable, unparseable or
    /// empty after normalization.
    async fn extract_text(&self, link: &str) -> Result<Option<String>, SourceError>;

    fn name(&self) -> &str;
}

/// Normalize fetched HTML into plain text: drop script/style blocks, strip
/// tags, decode entities, collapse whitespace.
pub fn normalize_html(s: &str) -> String {
    static RE_BLOCKS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_blocks = RE_BLOCKS.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap()
    });
    let mut out = re_blocks.replace_all(s, " ").to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = html_escape::decode_html_entities(&out).to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}
