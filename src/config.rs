// src/config.rs
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;

const ENV_PATH: &str = "CLIPPING_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/clipping.toml";

/// Application configuration. Resolution order:
/// 1) $CLIPPING_CONFIG_PATH (must exist when set)
/// 2) config/clipping.toml
/// 3) built-in defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dicionario_path: PathBuf,
    pub db_path: PathBuf,
    pub fontes: Vec<FonteConfig>,
    pub max_pages: u32,
    pub score_batch_limit: usize,
    pub retention_days: i64,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FonteConfig {
    pub nome: String,
    pub feed_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dicionario_path: PathBuf::from("config/dicionario_faciap.csv"),
            db_path: PathBuf::from("data/clipping.json"),
            fontes: vec![
                FonteConfig {
                    nome: "camara".to_string(),
                    feed_url: "https://www.camara.leg.br/noticias/rss".to_string(),
                },
                FonteConfig {
                    nome: "senado".to_string(),
                    feed_url: "https://www12.senado.leg.br/noticias/feed/noticias".to_string(),
                },
            ],
            max_pages: 10,
            score_batch_limit: 1000,
            retention_days: 30,
            concurrency: 4,
            timeout_secs: 20,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default = Path::new(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(default);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_pages: self.max_pages,
            score_batch_limit: self.score_batch_limit,
            retention_days: self.retention_days,
            concurrency: self.concurrency,
            timeout_secs: self.timeout_secs,
        }
    }
}
