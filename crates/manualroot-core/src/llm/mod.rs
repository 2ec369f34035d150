//! LLM integration
//!
//! Provides traits and implementations for:
//! - Chat completions and embeddings via external services (vLLM, OpenAI, etc.)
//! - Embedding generation
//! - Chunk reranking

mod cache;
mod client;
mod http_embedder;
mod http_reranker;
mod traits;

pub use cache::LLMCache;
pub use client::{
    backoff_delay, APIMetrics, ChatMessage, CompletionOptions, LLMClient, MetricsSnapshot,
    VLLMClient,
};
pub use http_embedder::HttpEmbedder;
pub use http_reranker::{HttpReranker, MAX_RERANK_CANDIDATES};
pub use traits::*;
