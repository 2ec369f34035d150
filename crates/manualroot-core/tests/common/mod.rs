//! Shared test doubles: a token-hash embedder and a scripted reasoning client

#![allow(dead_code)]

use async_trait::async_trait;
use manualroot_core::config::RetrievalConfig;
use manualroot_core::error::{ManualRootError, Result};
use manualroot_core::llm::{ChatMessage, CompletionOptions, Embedder, LLMClient};
use manualroot_core::search::{FilenameCache, HybridSearch, SearchBackend};
use manualroot_core::text::tokens;
use manualroot_core::{Database, Indexer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMENSIONS: usize = 512;

/// Bag-of-tokens embedding: one bucket per distinct normalized token.
/// Cosine similarity approximates shared tokens over sqrt(|a| * |b|).
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for token in tokens(text) {
            v[fnv1a(&token) % DIMENSIONS] = 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "token-hash"
    }
}

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Reasoning client answering from a closure and recording every prompt
pub struct ScriptedLlm {
    responder: Responder,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(responder: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails, so every call site must fall back
    pub fn unavailable() -> Self {
        Self::new(|_| Err(ManualRootError::Llm("service unavailable".into())))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

/// Whether the call is the history-based query rewrite
pub fn is_rewrite(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| m.content.contains("consulta de busca"))
}

/// Whether the call is answer composition
pub fn is_answer(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| m.role == "system")
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<String> {
        let reply = (self.responder)(&messages);
        self.prompts.lock().unwrap().push(messages);
        reply
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(HashEmbedder::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| HashEmbedder::vector(t)).collect())
    }

    fn embedding_dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// In-memory store with an indexer and search engine sharing one filename cache
pub struct Fixture {
    pub db: Arc<Database>,
    pub embedder: Arc<HashEmbedder>,
    pub filenames: Arc<FilenameCache>,
    pub indexer: Indexer,
}

impl Fixture {
    pub fn new(brands: &[(&str, &str)]) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize().unwrap();
        for (slug, name) in brands {
            db.add_brand(slug, name).unwrap();
        }
        let embedder = Arc::new(HashEmbedder::default());
        let filenames = Arc::new(FilenameCache::default());
        let indexer = Indexer::new(
            Arc::clone(&db),
            embedder.clone(),
            Arc::clone(&filenames),
        );
        Self {
            db,
            embedder,
            filenames,
            indexer,
        }
    }

    pub async fn add(&self, brand: &str, filename: &str, pages: &[&str]) -> i64 {
        let pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
        self.indexer
            .index_document(brand, filename, &pages, None)
            .await
            .unwrap()
            .document_id
    }

    pub fn search(&self, config: RetrievalConfig) -> HybridSearch {
        self.search_over(self.db.clone(), config)
    }

    pub fn search_over(&self, backend: Arc<dyn SearchBackend>, config: RetrievalConfig) -> HybridSearch {
        HybridSearch::new(
            backend,
            self.embedder.clone(),
            Arc::clone(&self.filenames),
            config,
        )
    }
}
