//! LLM trait definitions

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chunk relevance scoring trait
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score candidates against a query on a 0-10 scale
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate])
        -> Result<Vec<RerankScore>>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Candidate passed to a reranker
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub index: usize,
    pub filename: String,
    pub page: u32,
    pub text: String,
}

/// Score for one candidate, keyed by its index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub score: f64,
}
