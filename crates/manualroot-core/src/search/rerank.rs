//! Optional reranking before answer composition

use super::CandidateChunk;
use crate::llm::{RerankCandidate, Reranker, MAX_RERANK_CANDIDATES};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Minimum rerank score (0-10) for a chunk to be kept
pub const RERANK_KEEP_THRESHOLD: f64 = 5.0;

/// Chunks kept by fused score when reranking yields nothing usable
pub const RERANK_FALLBACK_TOP: usize = 7;

/// Rerank `chunks` (sorted best first) and keep at most `top`.
///
/// Chunks scoring at least [`RERANK_KEEP_THRESHOLD`] are kept, best rerank
/// score first. With no reranker, a reranker error, or nothing passing the
/// threshold, the first `top` chunks are kept as they are. Never fails.
pub async fn apply_rerank(
    reranker: Option<&dyn Reranker>,
    query: &str,
    chunks: Vec<CandidateChunk>,
    top: usize,
) -> Vec<CandidateChunk> {
    let Some(reranker) = reranker else {
        return chunks.into_iter().take(top).collect();
    };
    if chunks.is_empty() {
        return chunks;
    }

    let candidates: Vec<RerankCandidate> = chunks
        .iter()
        .take(MAX_RERANK_CANDIDATES)
        .enumerate()
        .map(|(index, c)| RerankCandidate {
            index,
            filename: c.filename.clone(),
            page: c.page,
            text: c.text.clone(),
        })
        .collect();

    let scores = match reranker.rerank(query, &candidates).await {
        Ok(scores) => scores,
        Err(e) => {
            tracing::warn!("Reranking failed, keeping fused order: {}", e);
            return chunks.into_iter().take(top).collect();
        }
    };

    let by_index: HashMap<usize, f64> = scores.into_iter().map(|s| (s.index, s.score)).collect();
    let mut kept: Vec<CandidateChunk> = chunks
        .iter()
        .take(MAX_RERANK_CANDIDATES)
        .enumerate()
        .filter_map(|(i, c)| {
            let score = *by_index.get(&i)?;
            (score >= RERANK_KEEP_THRESHOLD).then(|| {
                let mut c = c.clone();
                c.rerank_score = Some(score);
                c
            })
        })
        .collect();

    if kept.is_empty() {
        tracing::info!("No chunk passed reranking, keeping top {} by fused score", top);
        return chunks.into_iter().take(top).collect();
    }

    kept.sort_by(|a, b| {
        b.rerank_score
            .partial_cmp(&a.rerank_score)
            .unwrap_or(Ordering::Equal)
    });
    kept.truncate(top);
    tracing::info!("Reranking kept {} of {} chunks", kept.len(), candidates.len());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ManualRootError, Result};
    use crate::llm::RerankScore;
    use async_trait::async_trait;

    struct FixedReranker(Option<Vec<f64>>);

    #[async_trait]
    impl Reranker for FixedReranker {
        async fn rerank(&self, _query: &str, candidates: &[RerankCandidate]) -> Result<Vec<RerankScore>> {
            match &self.0 {
                Some(scores) => Ok(candidates
                    .iter()
                    .zip(scores)
                    .map(|(c, s)| RerankScore {
                        index: c.index,
                        score: *s,
                    })
                    .collect()),
                None => Err(ManualRootError::Llm("unparseable".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn chunks(n: usize) -> Vec<CandidateChunk> {
        (0..n)
            .map(|i| CandidateChunk {
                document_id: i as i64,
                filename: format!("doc{}.pdf", i),
                page: 1,
                chunk_index: 0,
                text: format!("trecho {}", i),
                score: 0.9 - i as f64 * 0.01,
                bonus: 0.0,
                rerank_score: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_keeps_passing_chunks_by_rerank_score() {
        let reranker = FixedReranker(Some(vec![3.0, 8.0, 5.0, 9.0]));
        let kept = apply_rerank(Some(&reranker), "q", chunks(4), 7).await;
        let ids: Vec<i64> = kept.iter().map(|c| c.document_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(kept[0].rerank_score, Some(9.0));
    }

    #[tokio::test]
    async fn test_nothing_passing_keeps_top() {
        let reranker = FixedReranker(Some(vec![1.0; 10]));
        let kept = apply_rerank(Some(&reranker), "q", chunks(10), 7).await;
        assert_eq!(kept.len(), 7);
        assert_eq!(kept[0].document_id, 0);
        assert!(kept.iter().all(|c| c.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_error_keeps_top() {
        let reranker = FixedReranker(None);
        let kept = apply_rerank(Some(&reranker), "q", chunks(9), 7).await;
        assert_eq!(kept.len(), 7);
    }

    #[tokio::test]
    async fn test_without_reranker() {
        let kept = apply_rerank(None, "q", chunks(3), 7).await;
        assert_eq!(kept.len(), 3);
    }
}
