//! # Term Dictionary
//!
//! Weighted keyword table driving the scoring engine: rows of
//! `(termo, categoria, peso_interesse, peso_risco)`.
//!
//! - Loads from CSV (the original clipping format) or TOML, by extension.
//! - Terms are stored lower-cased; matching is case-insensitive.
//! - Rejects empty terms, empty categories, and negative weights with a
//!   `ConfigError` naming the offending line.
//! - `load_or_fallback` degrades to a built-in seed when the file is missing
//!   or malformed, and tags the result with its origin so the degradation is
//!   visible in logs and on `/api/status`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermEntry {
    /// Lower-cased term, matched by substring containment.
    pub termo: String,
    pub categoria: String,
    pub peso_interesse: u32,
    pub peso_risco: u32,
}

/// Where the active dictionary came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryOrigin {
    Arquivo,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct TermDictionary {
    entries: Vec<TermEntry>,
    origin: DictionaryOrigin,
}

impl TermDictionary {
    /// Load and validate a dictionary file. TOML by extension, CSV otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let entries = if ext == "toml" {
            parse_toml(path, &content)?
        } else {
            parse_csv(path, &content)?
        };
        if entries.is_empty() {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                reason: "dicionário sem entradas".to_string(),
            });
        }
        Ok(Self {
            entries,
            origin: DictionaryOrigin::Arquivo,
        })
    }

    /// Load from `path`, degrading to the built-in seed on any config error.
    /// The returned dictionary carries its origin tag.
    pub fn load_or_fallback(path: &Path) -> Self {
        match Self::load(path) {
            Ok(dict) => {
                info!(termos = dict.len(), path = %path.display(), "dicionário carregado");
                dict
            }
            Err(e) => {
                warn!(error = %e, "dicionário indisponível, usando fallback embutido");
                Self::fallback()
            }
        }
    }

    /// Built-in seed, used when no valid dictionary file is available.
    pub fn fallback() -> Self {
        let entries = [
            ("educação", "Educação", 8, 3),
            ("tecnologia", "Tecnologia", 7, 5),
            ("inteligência artificial", "IA", 9, 8),
            ("dados", "Dados", 6, 7),
            ("startup", "Empreendedorismo", 7, 4),
            ("inovação", "Inovação", 8, 3),
        ]
        .into_iter()
        .map(|(termo, categoria, pi, pr)| TermEntry {
            termo: termo.to_string(),
            categoria: categoria.to_string(),
            peso_interesse: pi,
            peso_risco: pr,
        })
        .collect();
        Self {
            entries,
            origin: DictionaryOrigin::Fallback,
        }
    }

    pub fn origin(&self) -> DictionaryOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermEntry> {
        self.entries.iter()
    }

    /// Unique category labels, in first-seen dictionary order.
    pub fn categorias(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            if !out.iter().any(|c| c == &e.categoria) {
                out.push(e.categoria.clone());
            }
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn from_entries_for_test(entries: Vec<TermEntry>) -> Self {
        Self {
            entries,
            origin: DictionaryOrigin::Arquivo,
        }
    }
}

fn validate(
    path: &Path,
    line: usize,
    termo: &str,
    categoria: &str,
    peso_interesse: i64,
    peso_risco: i64,
) -> Result<TermEntry, ConfigError> {
    let err = |reason: &str| ConfigError::InvalidEntry {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };
    let termo = termo.trim();
    let categoria = categoria.trim();
    if termo.is_empty() {
        return Err(err("termo vazio"));
    }
    if categoria.is_empty() {
        return Err(err("categoria vazia"));
    }
    if peso_interesse < 0 || peso_risco < 0 {
        return Err(err("peso negativo"));
    }
    Ok(TermEntry {
        termo: termo.to_lowercase(),
        categoria: categoria.to_string(),
        peso_interesse: peso_interesse as u32,
        peso_risco: peso_risco as u32,
    })
}

fn parse_csv(path: &Path, content: &str) -> Result<Vec<TermEntry>, ConfigError> {
    let mut out = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        // Optional header row.
        if idx == 0 && line.to_lowercase().starts_with("termo") {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(ConfigError::InvalidEntry {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("esperadas 4 colunas, encontradas {}", fields.len()),
            });
        }
        let parse_peso = |s: &str| {
            s.parse::<i64>().map_err(|_| ConfigError::InvalidEntry {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("peso inválido: '{s}'"),
            })
        };
        let pi = parse_peso(fields[2])?;
        let pr = parse_peso(fields[3])?;
        out.push(validate(path, line_no, fields[0], fields[1], pi, pr)?);
    }
    Ok(out)
}

fn parse_toml(path: &Path, content: &str) -> Result<Vec<TermEntry>, ConfigError> {
    #[derive(Deserialize)]
    struct TomlDict {
        termos: Vec<TomlEntry>,
    }
    #[derive(Deserialize)]
    struct TomlEntry {
        termo: String,
        categoria: String,
        peso_interesse: i64,
        peso_risco: i64,
    }

    let parsed: TomlDict = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parsed
        .termos
        .iter()
        .enumerate()
        .map(|(idx, t)| {
            validate(
                path,
                idx + 1,
                &t.termo,
                &t.categoria,
                t.peso_interesse,
                t.peso_risco,
            )
        })
        .collect()
}
