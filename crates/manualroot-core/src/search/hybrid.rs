//! Five-phase hybrid search

use super::filename::{filename_match_score, FilenameCache};
use super::fusion::{fuse, FusionContext};
use super::keywords::extract_search_keywords;
use super::{CandidateChunk, ChunkKey, SearchBackend, VectorFilter};
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::llm::Embedder;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Pages fetched per literal keyword lookup
const KEYWORD_PAGE_LIMIT: usize = 50;

/// What each phase contributed to one search
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseStats {
    pub dense: usize,
    pub filename_injected: usize,
    pub keyword_injected: usize,
    pub multi_query_injected: usize,
    pub keywords: Vec<String>,
    /// Auxiliary phases that failed and were skipped
    pub skipped: Vec<String>,
}

/// Ranked chunks plus per-phase statistics
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub chunks: Vec<CandidateChunk>,
    pub stats: PhaseStats,
}

impl SearchOutcome {
    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            chunks: Vec::new(),
            stats: PhaseStats::default(),
        }
    }
}

/// Candidate pool with identity-based deduplication
#[derive(Default)]
struct Pool {
    chunks: Vec<CandidateChunk>,
    seen: HashSet<ChunkKey>,
    documents: HashSet<i64>,
}

impl Pool {
    fn add(&mut self, chunk: CandidateChunk) -> bool {
        if !self.seen.insert(chunk.key()) {
            return false;
        }
        self.documents.insert(chunk.document_id);
        self.chunks.push(chunk);
        true
    }

    fn extend(&mut self, chunks: Vec<CandidateChunk>) -> usize {
        let mut added = 0;
        for chunk in chunks {
            if self.add(chunk) {
                added += 1;
            }
        }
        added
    }

    fn has_document(&self, id: i64) -> bool {
        self.documents.contains(&id)
    }
}

/// Hybrid search over one brand collection
pub struct HybridSearch {
    backend: Arc<dyn SearchBackend>,
    embedder: Arc<dyn Embedder>,
    filenames: Arc<FilenameCache>,
    config: RetrievalConfig,
}

impl HybridSearch {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        embedder: Arc<dyn Embedder>,
        filenames: Arc<FilenameCache>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            backend,
            embedder,
            filenames,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run all phases for `query` and return at most `limit` chunks.
    ///
    /// Only the dense phase can fail the search; filename, keyword and
    /// multi-query injection failures are logged and skipped.
    pub async fn search(&self, brand: &str, query: &str, limit: usize) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(SearchOutcome::empty(query));
        }

        let mut stats = PhaseStats {
            keywords: extract_search_keywords(query),
            ..Default::default()
        };
        let mut ctx = FusionContext::new(query, &self.config);
        let mut pool = Pool::default();

        // Phase 1: dense
        let embedding = self.embedder.embed(query).await?;
        let dense = self.backend.vector_search(
            brand,
            &embedding,
            self.config.pool_size(limit),
            self.config.min_similarity,
            None,
        )?;
        stats.dense = pool.extend(dense);

        // Phase 2: filename injection
        match self.inject_by_filename(brand, query, &embedding, &mut pool, &mut ctx) {
            Ok(n) => stats.filename_injected = n,
            Err(e) => {
                tracing::warn!("Filename injection failed, skipping: {}", e);
                stats.skipped.push("filename".to_string());
            }
        }

        // Phase 3: content keywords
        match self.inject_by_content(brand, &stats.keywords, &embedding, &mut pool, &mut ctx) {
            Ok(n) => stats.keyword_injected = n,
            Err(e) => {
                tracing::warn!("Content keyword injection failed, skipping: {}", e);
                stats.skipped.push("content_keyword".to_string());
            }
        }

        // Phase 4: multi-query
        let keywords: Vec<String> = stats
            .keywords
            .iter()
            .take(self.config.multi_query_keywords)
            .cloned()
            .collect();
        let (injected, failed) = self.inject_by_keywords(brand, &keywords, limit, &mut pool).await;
        stats.multi_query_injected = injected;
        if failed > 0 {
            stats.skipped.push("multi_query".to_string());
        }

        // Phase 5: fusion and diversity
        let pool_size = pool.chunks.len();
        let chunks = fuse(pool.chunks, &ctx, limit, self.config.diversity_cap);

        tracing::info!(
            "Hybrid search '{}': pool={} (dense={}, filename=+{}, keyword=+{}, multi=+{}) -> {}",
            query,
            pool_size,
            stats.dense,
            stats.filename_injected,
            stats.keyword_injected,
            stats.multi_query_injected,
            chunks.len()
        );

        Ok(SearchOutcome {
            query: query.to_string(),
            chunks,
            stats,
        })
    }

    /// Search each keyword on its own and re-fuse with `base`.
    ///
    /// Used as a fallback when the full query gave a weak verdict. Keyword
    /// failures are logged and skipped.
    pub async fn search_keywords(
        &self,
        brand: &str,
        query: &str,
        keywords: &[String],
        base: Vec<CandidateChunk>,
        limit: usize,
    ) -> Vec<CandidateChunk> {
        let mut pool = Pool::default();
        pool.extend(base);

        let (added, _) = self.inject_by_keywords(brand, keywords, limit, &mut pool).await;
        tracing::info!("Keyword fallback {:?} added {} candidates", keywords, added);

        let ctx = FusionContext::new(query, &self.config);
        fuse(pool.chunks, &ctx, limit, self.config.diversity_cap)
    }

    fn inject_by_filename(
        &self,
        brand: &str,
        query: &str,
        embedding: &[f32],
        pool: &mut Pool,
        ctx: &mut FusionContext,
    ) -> Result<usize> {
        let registry = self.filenames.get_or_load(self.backend.as_ref(), brand)?;

        let mut strong: Vec<i64> = Vec::new();
        for (&id, name) in registry.iter() {
            let score = filename_match_score(name, query);
            ctx.filename_scores.insert(id, score);
            if score >= self.config.filename_strong_threshold && !pool.has_document(id) {
                strong.push(id);
            }
        }
        strong.sort_unstable();

        let mut injected = 0;
        for id in strong {
            let hits = self.backend.vector_search(
                brand,
                embedding,
                self.config.injected_per_document,
                0.0,
                Some(&VectorFilter::document(id)),
            )?;
            tracing::debug!("Filename match injected document {} ({} chunks)", id, hits.len());
            injected += pool.extend(hits);
        }
        Ok(injected)
    }

    fn inject_by_content(
        &self,
        brand: &str,
        keywords: &[String],
        embedding: &[f32],
        pool: &mut Pool,
        ctx: &mut FusionContext,
    ) -> Result<usize> {
        // document -> matching pages, in discovery order
        let mut pages_by_doc: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
        for keyword in keywords {
            for page in self.backend.find_keyword_pages(brand, keyword, KEYWORD_PAGE_LIMIT)? {
                *ctx.content_hits
                    .entry((page.document_id, page.page))
                    .or_insert(0) += 1;
                let pages = pages_by_doc.entry(page.document_id).or_default();
                if !pages.contains(&page.page) {
                    pages.push(page.page);
                }
            }
        }

        let mut injected = 0;
        for (doc, pages) in pages_by_doc {
            if pool.has_document(doc) {
                continue;
            }
            for page in pages.into_iter().take(self.config.injected_per_document) {
                let hits = self.backend.vector_search(
                    brand,
                    embedding,
                    1,
                    0.0,
                    Some(&VectorFilter::page(doc, page)),
                )?;
                injected += pool.extend(hits);
            }
            tracing::debug!("Content keyword injected document {}", doc);
        }
        Ok(injected)
    }

    /// Embed and search each keyword in turn, skipping the ones that fail.
    /// Returns the chunks injected and the number of failed keywords.
    async fn inject_by_keywords(
        &self,
        brand: &str,
        keywords: &[String],
        limit: usize,
        pool: &mut Pool,
    ) -> (usize, usize) {
        let mut injected = 0;
        let mut failed = 0;
        for keyword in keywords {
            match self.keyword_hits(brand, keyword, limit).await {
                Ok(hits) => injected += pool.extend(hits),
                Err(e) => {
                    tracing::warn!("Keyword search for '{}' failed, skipping: {}", keyword, e);
                    failed += 1;
                }
            }
        }
        (injected, failed)
    }

    async fn keyword_hits(&self, brand: &str, keyword: &str, limit: usize) -> Result<Vec<CandidateChunk>> {
        let embedding = self.embedder.embed(keyword).await?;
        self.backend
            .vector_search(brand, &embedding, limit, self.config.min_similarity, None)
    }
}
