//! Page indexing pipeline
//!
//! Stores raw page text, chunks it, embeds the chunks and writes them to the
//! vector index. Every mutation drops the brand's cached filename registry.

use super::chunker::build_contextual_chunks;
use crate::db::{ChunkRecord, Database, DocumentStatus};
use crate::error::{ManualRootError, Result};
use crate::llm::Embedder;
use crate::search::FilenameCache;
use serde::Serialize;
use std::sync::Arc;

const BATCH_SIZE: usize = 32;

/// Indexing progress, reported after each page
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub chunks: usize,
}

/// Outcome of indexing one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub document_id: i64,
    pub pages: usize,
    pub unchanged_pages: usize,
    pub empty_pages: usize,
    pub chunks: usize,
}

pub struct Indexer {
    db: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    filenames: Arc<FilenameCache>,
}

impl Indexer {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn Embedder>, filenames: Arc<FilenameCache>) -> Self {
        Self {
            db,
            embedder,
            filenames,
        }
    }

    /// Register a document under `brand`, returning its id
    pub fn register_document(&self, brand: &str, filename: &str) -> Result<i64> {
        self.db.require_brand(brand)?;
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ManualRootError::InvalidInput("filename is empty".into()));
        }
        let id = self.db.register_document(brand, filename)?;
        self.filenames.invalidate(brand);
        Ok(id)
    }

    /// Chunk, embed and store one page, returning the number of chunks written.
    ///
    /// A page whose stored text is unchanged is skipped and returns 0. The
    /// page text is only stored once all of its chunks are embedded.
    pub async fn index_page(&self, document_id: i64, page: u32, text: &str) -> Result<usize> {
        let document = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| ManualRootError::DocumentNotFound(document_id.to_string()))?;

        if self.db.page_unchanged(document_id, page, text)? {
            tracing::debug!("Page {} of {} unchanged", page, document.filename);
            return Ok(0);
        }

        let chunks = build_contextual_chunks(text);
        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(BATCH_SIZE) {
            let embeddings = self.embedder.embed_batch(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(ManualRootError::Index(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (text, embedding) in batch.iter().zip(embeddings) {
                records.push(ChunkRecord {
                    chunk_index: records.len() as u32,
                    text: text.clone(),
                    embedding,
                });
            }
        }

        let written =
            self.db
                .store_page(document_id, page, text, self.embedder.model_name(), &records)?;
        self.filenames.invalidate(&document.brand);
        Ok(written)
    }

    /// Index a whole document, pages numbered from 1.
    ///
    /// The document is marked ready on success. Any failure marks it failed
    /// and is returned; quota exhaustion is never retried here.
    pub async fn index_document(
        &self,
        brand: &str,
        filename: &str,
        pages: &[String],
        progress: Option<&(dyn Fn(IndexProgress) + Send + Sync)>,
    ) -> Result<IndexReport> {
        let document_id = self.register_document(brand, filename)?;
        self.db
            .set_document_status(document_id, DocumentStatus::Indexing)?;

        let mut report = IndexReport {
            document_id,
            ..Default::default()
        };

        for (i, text) in pages.iter().enumerate() {
            let page = i as u32 + 1;
            if text.trim().is_empty() {
                report.empty_pages += 1;
                continue;
            }
            match self.index_page(document_id, page, text).await {
                Ok(0) => report.unchanged_pages += 1,
                Ok(n) => {
                    report.pages += 1;
                    report.chunks += n;
                }
                Err(e) => {
                    if matches!(e, ManualRootError::QuotaExhausted(_)) {
                        tracing::warn!("Quota exhausted while indexing {}, page {}", filename, page);
                    } else {
                        tracing::warn!("Indexing {} failed at page {}: {}", filename, page, e);
                    }
                    self.db
                        .set_document_status(document_id, DocumentStatus::Failed)?;
                    return Err(e);
                }
            }
            if let Some(cb) = progress {
                cb(IndexProgress {
                    total_pages: pages.len(),
                    processed_pages: i + 1,
                    chunks: report.chunks,
                });
            }
        }

        self.db
            .set_document_status(document_id, DocumentStatus::Ready)?;
        tracing::info!(
            "Indexed {}: {} pages, {} chunks ({} unchanged, {} empty)",
            filename,
            report.pages,
            report.chunks,
            report.unchanged_pages,
            report.empty_pages
        );
        Ok(report)
    }

    /// Remove a document with its pages and chunks
    pub fn delete_document(&self, document_id: i64) -> Result<()> {
        let brand = self.db.delete_document(document_id)?;
        self.filenames.invalidate(&brand);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchBackend;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    struct QuotaEmbedder;

    #[async_trait]
    impl Embedder for QuotaEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(ManualRootError::QuotaExhausted("RESOURCE_EXHAUSTED".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(ManualRootError::QuotaExhausted("RESOURCE_EXHAUSTED".into()))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "quota"
        }
    }

    /// Fails the first batch with quota exhaustion, then behaves like [`LengthEmbedder`]
    #[derive(Default)]
    struct QuotaOnceEmbedder {
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Embedder for QuotaOnceEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            LengthEmbedder.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(ManualRootError::QuotaExhausted("quota".into()));
            }
            LengthEmbedder.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "quota-once"
        }
    }

    fn setup(embedder: Arc<dyn Embedder>) -> (Arc<Database>, Arc<FilenameCache>, Indexer) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize().unwrap();
        db.add_brand("otis", "Otis").unwrap();
        let cache = Arc::new(FilenameCache::default());
        let indexer = Indexer::new(Arc::clone(&db), embedder, Arc::clone(&cache));
        (db, cache, indexer)
    }

    #[tokio::test]
    async fn test_index_document() {
        let (db, _, indexer) = setup(Arc::new(LengthEmbedder));
        let pages = vec![
            "Ajuste do freio do GEN2".to_string(),
            String::new(),
            "Falha UV no OVF10".to_string(),
        ];
        let report = indexer
            .index_document("otis", "Manual GEN2.pdf", &pages, None)
            .await
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.empty_pages, 1);
        assert_eq!(report.chunks, 2);

        let doc = db.get_document(report.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(doc.total_pages, 3);
    }

    #[tokio::test]
    async fn test_reindexing_unchanged_page_is_skipped() {
        let (_, _, indexer) = setup(Arc::new(LengthEmbedder));
        let pages = vec!["Ajuste do freio".to_string()];
        indexer.index_document("otis", "a.pdf", &pages, None).await.unwrap();
        let report = indexer.index_document("otis", "a.pdf", &pages, None).await.unwrap();
        assert_eq!(report.unchanged_pages, 1);
        assert_eq!(report.chunks, 0);
    }

    #[tokio::test]
    async fn test_mutations_invalidate_filename_cache() {
        let (db, cache, indexer) = setup(Arc::new(LengthEmbedder));
        let backend: &dyn SearchBackend = &*db;

        cache.get_or_load(backend, "otis").unwrap();
        let id = indexer.register_document("otis", "a.pdf").unwrap();
        assert!(!cache.is_cached("otis"));

        let names = cache.get_or_load(backend, "otis").unwrap();
        assert_eq!(names.get(&id).map(String::as_str), Some("a.pdf"));

        indexer.delete_document(id).unwrap();
        assert!(!cache.is_cached("otis"));
        assert!(cache.get_or_load(backend, "otis").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quota_marks_document_failed() {
        let (db, _, indexer) = setup(Arc::new(QuotaEmbedder));
        let err = indexer
            .index_document("otis", "a.pdf", &["texto".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManualRootError::QuotaExhausted(_)));
        let docs = db.list_brand_documents("otis").unwrap();
        assert_eq!(docs[0].status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_page_is_indexed_on_next_run() {
        let (db, _, indexer) = setup(Arc::new(QuotaOnceEmbedder::default()));
        let pages = vec!["Ajuste do freio do GEN2".to_string()];

        let err = indexer
            .index_document("otis", "a.pdf", &pages, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManualRootError::QuotaExhausted(_)));
        assert_eq!(db.count_chunks(Some("otis")).unwrap(), 0);

        let report = indexer.index_document("otis", "a.pdf", &pages, None).await.unwrap();
        assert_eq!(report.unchanged_pages, 0);
        assert_eq!(report.pages, 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(db.count_chunks(Some("otis")).unwrap(), 1);
        let doc = db.get_document(report.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
    }

    #[tokio::test]
    async fn test_unknown_brand() {
        let (_, _, indexer) = setup(Arc::new(LengthEmbedder));
        let err = indexer.register_document("schindler", "a.pdf").unwrap_err();
        assert!(matches!(err, ManualRootError::BrandNotFound(_)));
    }
}
