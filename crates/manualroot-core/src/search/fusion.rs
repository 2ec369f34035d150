//! Bonus fusion and diversity selection

use super::filename::filename_match_score;
use super::keywords::{fault_tokens, lexical_bonus};
use super::{CandidateChunk, ChunkKey};
use crate::config::RetrievalConfig;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Bonus per distinct content keyword found on a chunk's page
const CONTENT_HIT_BONUS: f64 = 0.05;

/// Query-derived signals applied during fusion
#[derive(Debug, Clone, Default)]
pub struct FusionContext {
    pub query: String,
    pub fault_tokens: Vec<String>,
    /// Filename match score per document id, when already known
    pub filename_scores: HashMap<i64, f64>,
    /// Number of content keywords found per (document, page)
    pub content_hits: HashMap<(i64, u32), usize>,
    pub lexical_cap: f64,
    pub filename_cap: f64,
    pub content_cap: f64,
}

impl FusionContext {
    pub fn new(query: &str, config: &RetrievalConfig) -> Self {
        Self {
            query: query.to_string(),
            fault_tokens: fault_tokens(query),
            filename_scores: HashMap::new(),
            content_hits: HashMap::new(),
            lexical_cap: config.lexical_bonus_cap,
            filename_cap: config.filename_bonus_cap,
            content_cap: config.content_bonus_cap,
        }
    }

    fn bonus_for(&self, chunk: &CandidateChunk, memo: &mut HashMap<i64, f64>) -> f64 {
        let lexical = lexical_bonus(&chunk.text, &self.fault_tokens, self.lexical_cap);

        let name_score = *memo.entry(chunk.document_id).or_insert_with(|| {
            self.filename_scores
                .get(&chunk.document_id)
                .copied()
                .unwrap_or_else(|| filename_match_score(&chunk.filename, &self.query))
        });
        let filename = (name_score * self.filename_cap).min(self.filename_cap);

        let hits = self.content_hits.get(&chunk.page_key()).copied().unwrap_or(0);
        let content = (hits as f64 * CONTENT_HIT_BONUS).min(self.content_cap);

        lexical + filename + content
    }
}

fn by_final_score(a: &CandidateChunk, b: &CandidateChunk) -> Ordering {
    b.final_score()
        .partial_cmp(&a.final_score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.key().cmp(&b.key()))
}

/// Fuse a candidate pool into a ranked, diversity-constrained list.
///
/// Duplicates by chunk identity keep their best base score, bonuses are
/// recomputed from `ctx`, and only the best chunk of each (document, page)
/// survives before the diversity cap is applied.
pub fn fuse(
    candidates: Vec<CandidateChunk>,
    ctx: &FusionContext,
    limit: usize,
    diversity_cap: usize,
) -> Vec<CandidateChunk> {
    let mut by_key: HashMap<ChunkKey, CandidateChunk> = HashMap::new();
    for chunk in candidates {
        let keep_existing = by_key
            .get(&chunk.key())
            .is_some_and(|existing| existing.score >= chunk.score);
        if !keep_existing {
            by_key.insert(chunk.key(), chunk);
        }
    }

    let mut memo = HashMap::new();
    let mut best_per_page: HashMap<(i64, u32), CandidateChunk> = HashMap::new();
    for mut chunk in by_key.into_values() {
        chunk.bonus = ctx.bonus_for(&chunk, &mut memo);
        let keep_existing = best_per_page
            .get(&chunk.page_key())
            .is_some_and(|existing| by_final_score(existing, &chunk) != Ordering::Greater);
        if !keep_existing {
            best_per_page.insert(chunk.page_key(), chunk);
        }
    }

    let mut ranked: Vec<CandidateChunk> = best_per_page.into_values().collect();
    ranked.sort_by(by_final_score);
    select_diverse(ranked, limit, diversity_cap)
}

/// Greedy selection with at most `cap` chunks per document.
///
/// `ranked` must be sorted best first. When the capped selection
/// under-fills `limit`, skipped chunks backfill by score.
pub fn select_diverse(ranked: Vec<CandidateChunk>, limit: usize, cap: usize) -> Vec<CandidateChunk> {
    let mut per_doc: HashMap<i64, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(limit);
    let mut skipped = Vec::new();

    for chunk in ranked {
        if selected.len() >= limit {
            break;
        }
        let count = per_doc.entry(chunk.document_id).or_insert(0);
        if *count < cap {
            *count += 1;
            selected.push(chunk);
        } else {
            skipped.push(chunk);
        }
    }

    if selected.len() < limit && !skipped.is_empty() {
        tracing::debug!(
            "Diversity cap under-filled ({} of {}), backfilling",
            selected.len(),
            limit
        );
        let room = limit - selected.len();
        selected.extend(skipped.into_iter().take(room));
        selected.sort_by(by_final_score);
    }

    selected
}

/// Documents contributing to a chunk list
pub fn unique_documents(chunks: &[CandidateChunk]) -> HashSet<i64> {
    chunks.iter().map(|c| c.document_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: i64, page: u32, idx: u32, score: f64) -> CandidateChunk {
        CandidateChunk {
            document_id: doc,
            filename: format!("doc{}.pdf", doc),
            page,
            chunk_index: idx,
            text: String::new(),
            score,
            bonus: 0.0,
            rerank_score: None,
        }
    }

    fn ctx() -> FusionContext {
        FusionContext::new("porta", &RetrievalConfig::default())
    }

    #[test]
    fn test_duplicate_keys_keep_best_score() {
        let fused = fuse(
            vec![chunk(1, 1, 0, 0.5), chunk(1, 1, 0, 0.7)],
            &ctx(),
            10,
            3,
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].score, 0.7);
    }

    #[test]
    fn test_one_chunk_per_page() {
        let fused = fuse(
            vec![chunk(1, 1, 0, 0.5), chunk(1, 1, 1, 0.6), chunk(1, 2, 0, 0.4)],
            &ctx(),
            10,
            3,
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk_index, 1);
    }

    #[test]
    fn test_diversity_cap() {
        let mut pool = Vec::new();
        for page in 0..5 {
            pool.push(chunk(1, page, 0, 0.9 - page as f64 * 0.01));
        }
        for doc in 2..6 {
            pool.push(chunk(doc, 0, 0, 0.5));
        }
        let fused = fuse(pool, &ctx(), 5, 2);
        assert_eq!(fused.len(), 5);
        assert_eq!(fused.iter().filter(|c| c.document_id == 1).count(), 2);
    }

    #[test]
    fn test_backfill_when_underfilled() {
        let pool: Vec<_> = (0..6).map(|p| chunk(1, p, 0, 0.8)).collect();
        let fused = fuse(pool, &ctx(), 4, 2);
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn test_bonuses_are_capped() {
        let mut ctx = FusionContext::new("UV OV OC OH OL FU", &RetrievalConfig::default());
        ctx.filename_scores.insert(1, 1.0);
        ctx.content_hits.insert((1, 1), 9);
        let mut c = chunk(1, 1, 0, 0.5);
        c.text = "UV OV OC OH OL FU".to_string();
        let fused = fuse(vec![c], &ctx, 10, 3);
        assert!((fused[0].bonus - (0.24 + 0.15 + 0.10)).abs() < 1e-9);
    }

    #[test]
    fn test_filename_bonus_lifts_matching_document() {
        let ctx = FusionContext::new("ovf10", &RetrievalConfig::default());
        let mut a = chunk(1, 1, 0, 0.60);
        a.filename = "Calibracao do OVF10.pdf".to_string();
        let b = chunk(2, 1, 0, 0.65);
        let fused = fuse(vec![a, b], &ctx, 10, 3);
        assert_eq!(fused[0].document_id, 1);
    }
}
