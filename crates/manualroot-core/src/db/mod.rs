//! Database layer for manualroot
//!
//! Provides SQLite-based storage with:
//! - Brand-scoped document registry and raw page text
//! - Chunk embeddings stored as BLOBs (cosine similarity in Rust)
//! - Append-only conversation turns

mod conversations;
mod documents;
mod schema;
mod stats;
pub mod vectors;

pub use conversations::ConversationInfo;
pub use documents::{hash_text, BrandInfo, DocumentInfo, DocumentStatus};
pub use schema::Database;
pub use stats::IndexStats;
pub use vectors::ChunkRecord;

use crate::error::Result;
use crate::search::{CandidateChunk, DocumentEntry, PageRef, SearchBackend, VectorFilter};
use std::path::PathBuf;

impl Database {
    /// Database path from `MANUALROOT_DB`, else the user cache directory
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("MANUALROOT_DB") {
            return PathBuf::from(path);
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("index.sqlite")
    }
}

impl SearchBackend for Database {
    fn vector_search(
        &self,
        brand: &str,
        embedding: &[f32],
        limit: usize,
        min_score: f64,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<CandidateChunk>> {
        self.nearest_chunks(brand, embedding, limit, min_score, filter)
    }

    fn find_keyword_pages(&self, brand: &str, keyword: &str, limit: usize) -> Result<Vec<PageRef>> {
        self.find_pages_containing(brand, keyword, limit)
    }

    fn list_documents(&self, brand: &str, offset: usize, limit: usize) -> Result<Vec<DocumentEntry>> {
        self.document_registry_page(brand, offset, limit)
    }
}
