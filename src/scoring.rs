//! # Scoring Engine
//! Pure, testable logic that maps `(titulo, texto, dictionary)` → scores.
//! No I/O; scores are a cache of this computation, re-derivable at any time.
//!
//! Matching is substring containment over the lower-cased haystack, inherited
//! deliberately from the original clipping rules ("educação" also matches
//! inside "reeducação"). It lives behind `Scorer` so tokenized word-boundary
//! matching could be substituted later without touching the pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dictionary::TermDictionary;

/// Derived scores for one news item. Owned by the item it was computed for;
/// superseded whenever recomputed with a different dictionary or text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreResult {
    pub score_interesse: u32,
    pub score_risco: u32,
    /// Categories of matching terms, set semantics, first-match order.
    pub categorias: Vec<String>,
}

impl ScoreResult {
    /// Combined score used for ranking.
    pub fn score_total(&self) -> u32 {
        self.score_interesse + self.score_risco
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    dictionary: Arc<TermDictionary>,
}

impl Scorer {
    pub fn new(dictionary: Arc<TermDictionary>) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    /// Score one item. Empty text short-circuits to zero without touching the
    /// dictionary; a matching term contributes its weights exactly once no
    /// matter how often it occurs.
    pub fn score(&self, titulo: &str, texto: &str) -> ScoreResult {
        if texto.is_empty() {
            return ScoreResult::default();
        }

        // Title first, then body; dictionary terms are stored lower-cased.
        let haystack = format!("{titulo} {texto}").to_lowercase();

        let mut result = ScoreResult::default();
        for entry in self.dictionary.iter() {
            if haystack.contains(entry.termo.as_str()) {
                result.score_interesse += entry.peso_interesse;
                result.score_risco += entry.peso_risco;
                if !result.categorias.iter().any(|c| c == &entry.categoria) {
                    result.categorias.push(entry.categoria.clone());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::TermEntry;

    fn entry(termo: &str, categoria: &str, pi: u32, pr: u32) -> TermEntry {
        TermEntry {
            termo: termo.to_string(),
            categoria: categoria.to_string(),
            peso_interesse: pi,
            peso_risco: pr,
        }
    }

    fn scorer(entries: Vec<TermEntry>) -> Scorer {
        Scorer::new(Arc::new(TermDictionary::from_entries_for_test(entries)))
    }

    #[test]
    fn matches_single_term_with_expected_weights() {
        let s = scorer(vec![entry("educação", "Educação", 8, 3)]);
        let r = s.score("", "Lei sobre educação digital aprovada");
        assert_eq!(r.score_interesse, 8);
        assert_eq!(r.score_risco, 3);
        assert_eq!(r.categorias, vec!["Educação"]);
        assert_eq!(r.score_total(), 11);
    }

    #[test]
    fn empty_text_short_circuits_to_zero() {
        let s = scorer(vec![entry("educação", "Educação", 8, 3)]);
        let r = s.score("Educação em pauta", "");
        assert_eq!(r, ScoreResult::default());
    }

    #[test]
    fn repeated_occurrences_count_once() {
        let s = scorer(vec![entry("dados", "Dados", 6, 7)]);
        let r = s.score("", "dados pessoais e dados públicos são dados");
        assert_eq!(r.score_interesse, 6);
        assert_eq!(r.score_risco, 7);
        assert_eq!(r.categorias, vec!["Dados"]);
    }

    #[test]
    fn matching_is_case_insensitive_including_accents() {
        let s = scorer(vec![entry("educação", "Educação", 8, 3)]);
        let r = s.score("EDUCAÇÃO DIGITAL", "A EDUCAÇÃO avança");
        assert_eq!(r.score_interesse, 8);
    }

    #[test]
    fn substring_containment_matches_inside_larger_words() {
        let s = scorer(vec![entry("educação", "Educação", 8, 3)]);
        let r = s.score("", "programa de reeducação alimentar");
        assert_eq!(r.score_interesse, 8);
    }

    #[test]
    fn duplicate_categories_collapse_in_first_match_order() {
        let s = scorer(vec![
            entry("escola", "Educação", 2, 1),
            entry("dados", "Dados", 6, 7),
            entry("professor", "Educação", 3, 1),
        ]);
        let r = s.score("", "escola de dados para cada professor");
        assert_eq!(r.score_interesse, 11);
        assert_eq!(r.score_risco, 9);
        assert_eq!(r.categorias, vec!["Educação", "Dados"]);
    }

    #[test]
    fn title_participates_in_matching() {
        let s = scorer(vec![entry("startup", "Empreendedorismo", 7, 4)]);
        let r = s.score("Incentivo a startup aprovado", "texto sem o termo");
        assert_eq!(r.score_interesse, 7);
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer(vec![
            entry("educação", "Educação", 8, 3),
            entry("dados", "Dados", 6, 7),
        ]);
        let a = s.score("Educação e dados", "debate sobre educação e dados");
        let b = s.score("Educação e dados", "debate sobre educação e dados");
        assert_eq!(a, b);
    }
}
