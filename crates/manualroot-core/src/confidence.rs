//! Confidence classification of a ranked chunk list

use crate::config::ConfidenceConfig;
use crate::search::{extract_search_keywords, CandidateChunk};
use serde::Serialize;

/// Why a verdict was reached. Exactly one per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceReason {
    NoResults,
    StrongMatchWithTerms,
    StrongMatch,
    ClearLeader,
    TermsFoundModerateScore,
    TermsNotFound,
    TooManySimilarDocs,
    LowScores,
    AmbiguousMultiDoc,
    Acceptable,
}

impl ConfidenceReason {
    pub const ALL: [ConfidenceReason; 10] = [
        Self::NoResults,
        Self::StrongMatchWithTerms,
        Self::StrongMatch,
        Self::ClearLeader,
        Self::TermsFoundModerateScore,
        Self::TermsNotFound,
        Self::TooManySimilarDocs,
        Self::LowScores,
        Self::AmbiguousMultiDoc,
        Self::Acceptable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoResults => "no_results",
            Self::StrongMatchWithTerms => "strong_match_with_terms",
            Self::StrongMatch => "strong_match",
            Self::ClearLeader => "clear_leader",
            Self::TermsFoundModerateScore => "terms_found_moderate_score",
            Self::TermsNotFound => "terms_not_found",
            Self::TooManySimilarDocs => "too_many_similar_docs",
            Self::LowScores => "low_scores",
            Self::AmbiguousMultiDoc => "ambiguous_multi_doc",
            Self::Acceptable => "acceptable",
        }
    }

    /// Whether this reason lets the policy answer directly
    pub fn is_confident(&self) -> bool {
        matches!(
            self,
            Self::StrongMatchWithTerms
                | Self::StrongMatch
                | Self::ClearLeader
                | Self::TermsFoundModerateScore
                | Self::Acceptable
        )
    }
}

impl std::fmt::Display for ConfidenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub confident: bool,
    pub reason: ConfidenceReason,
    /// Contributing document filenames, in rank order
    pub unique_docs: Vec<String>,
    pub top_score: f64,
    pub score_spread: f64,
    /// Top score minus the best score from a different document
    pub gap_to_second_doc: f64,
    pub terms_in_results: bool,
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
        .collect()
}

/// Whether any extracted term occurs in the first `window` chunks' text or filename
fn terms_present(chunks: &[CandidateChunk], terms: &[String], window: usize) -> bool {
    if terms.is_empty() {
        return true;
    }
    let terms: Vec<(String, String)> = terms
        .iter()
        .map(|t| {
            let lower = t.to_lowercase();
            let compact = strip_separators(&lower);
            (lower, compact)
        })
        .collect();

    chunks.iter().take(window).any(|c| {
        let combined = format!("{} {}", c.text, c.filename).to_lowercase();
        let combined_compact = strip_separators(&combined);
        terms.iter().any(|(lower, compact)| {
            combined.contains(lower.as_str())
                || (compact.chars().count() >= 3 && combined_compact.contains(compact.as_str()))
        })
    })
}

/// Classify `chunks` (ranked best first) retrieved for `query`
pub fn analyze(chunks: &[CandidateChunk], query: &str, config: &ConfidenceConfig) -> Verdict {
    let Some(first) = chunks.first() else {
        return Verdict {
            confident: false,
            reason: ConfidenceReason::NoResults,
            unique_docs: Vec::new(),
            top_score: 0.0,
            score_spread: 0.0,
            gap_to_second_doc: 0.0,
            terms_in_results: false,
        };
    };

    let mut unique_docs: Vec<String> = Vec::new();
    for c in chunks {
        if !unique_docs.contains(&c.filename) {
            unique_docs.push(c.filename.clone());
        }
    }

    let scores: Vec<f64> = chunks.iter().map(CandidateChunk::final_score).collect();
    let top_score = scores.iter().copied().fold(f64::MIN, f64::max);
    let min_score = scores.iter().copied().fold(f64::MAX, f64::min);
    let score_spread = top_score - min_score;

    let second_doc_score = chunks
        .iter()
        .skip(1)
        .find(|c| c.document_id != first.document_id)
        .map(CandidateChunk::final_score)
        .unwrap_or(0.0);
    let gap_to_second_doc = if second_doc_score != 0.0 {
        top_score - second_doc_score
    } else {
        top_score
    };

    let terms = extract_search_keywords(query);
    let terms_in_results = terms_present(chunks, &terms, config.term_window);
    let doc_count = unique_docs.len();

    use ConfidenceReason::*;
    let reason = if terms_in_results && top_score >= config.strong_with_terms {
        StrongMatchWithTerms
    } else if top_score >= config.strong {
        StrongMatch
    } else if top_score >= config.clear_leader && gap_to_second_doc >= config.clear_leader_gap {
        ClearLeader
    } else if terms_in_results && top_score >= config.moderate_with_terms {
        TermsFoundModerateScore
    } else if !terms.is_empty() && !terms_in_results {
        TermsNotFound
    } else if doc_count >= config.similar_docs_min && score_spread < config.similar_docs_spread {
        TooManySimilarDocs
    } else if top_score < config.low_score {
        LowScores
    } else if doc_count >= config.ambiguous_docs_min && gap_to_second_doc < config.ambiguous_gap {
        AmbiguousMultiDoc
    } else {
        Acceptable
    };

    tracing::info!(
        "Confidence: {} (top={:.3}, spread={:.3}, docs={}, terms_in_results={})",
        reason,
        top_score,
        score_spread,
        doc_count,
        terms_in_results
    );

    Verdict {
        confident: reason.is_confident(),
        reason,
        unique_docs,
        top_score,
        score_spread,
        gap_to_second_doc,
        terms_in_results,
    }
}
