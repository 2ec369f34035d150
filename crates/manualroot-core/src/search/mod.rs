//! Search engine module
//!
//! Provides:
//! - Dense similarity search over chunk embeddings
//! - Filename and content-keyword injection
//! - Multi-query expansion over extracted keywords
//! - Bonus fusion with a per-document diversity cap

mod filename;
mod fusion;
mod hybrid;
mod keywords;
mod rerank;

pub use filename::{display_name, filename_match_score, FilenameCache};
pub use fusion::{fuse, select_diverse, unique_documents, FusionContext};
pub use hybrid::{HybridSearch, PhaseStats, SearchOutcome};
pub use keywords::{extract_search_keywords, fault_tokens, lexical_bonus, FAULT_CODE_HINTS};
pub use rerank::{apply_rerank, RERANK_KEEP_THRESHOLD, RERANK_FALLBACK_TOP};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Identity of a chunk: (document id, page, chunk index)
pub type ChunkKey = (i64, u32, u32);

/// A scored chunk flowing through retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateChunk {
    pub document_id: i64,
    pub filename: String,
    pub page: u32,
    pub chunk_index: u32,
    pub text: String,
    /// Base similarity from the vector index
    pub score: f64,
    /// Accumulated fusion bonus
    pub bonus: f64,
    pub rerank_score: Option<f64>,
}

impl CandidateChunk {
    pub fn key(&self) -> ChunkKey {
        (self.document_id, self.page, self.chunk_index)
    }

    pub fn page_key(&self) -> (i64, u32) {
        (self.document_id, self.page)
    }

    /// Base similarity plus bonuses
    pub fn final_score(&self) -> f64 {
        self.score + self.bonus
    }
}

/// Restrict a vector search to one document or one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorFilter {
    pub document_id: Option<i64>,
    pub page: Option<u32>,
}

impl VectorFilter {
    pub fn document(document_id: i64) -> Self {
        Self {
            document_id: Some(document_id),
            page: None,
        }
    }

    pub fn page(document_id: i64, page: u32) -> Self {
        Self {
            document_id: Some(document_id),
            page: Some(page),
        }
    }
}

/// A page whose raw text matched a literal lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub document_id: i64,
    pub page: u32,
}

/// One entry of the document registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: i64,
    pub filename: String,
}

/// Storage the hybrid search runs against.
///
/// All lookups are scoped to one brand collection.
pub trait SearchBackend: Send + Sync {
    /// Nearest chunks by cosine similarity, at least `min_score`, best first
    fn vector_search(
        &self,
        brand: &str,
        embedding: &[f32],
        limit: usize,
        min_score: f64,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<CandidateChunk>>;

    /// Pages whose raw text contains `keyword`, case-insensitively
    fn find_keyword_pages(&self, brand: &str, keyword: &str, limit: usize) -> Result<Vec<PageRef>>;

    /// One page of the document id to filename registry
    fn list_documents(&self, brand: &str, offset: usize, limit: usize) -> Result<Vec<DocumentEntry>>;
}
