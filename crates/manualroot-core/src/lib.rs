//! Manualroot Core Library
//!
//! Troubleshooting assistant over brand-scoped technical manuals.
//!
//! # Features
//! - Entity extraction of model, board, drive, symptom and error code
//! - History-aware query enrichment with identifier preservation
//! - Five-phase hybrid search with bonus fusion and a diversity cap
//! - Rule-based confidence verdicts
//! - Dialogue policy that clarifies, disambiguates or answers with citations

pub mod chat;
pub mod confidence;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod domain;
pub mod entity;
pub mod error;
pub mod index;
pub mod llm;
pub mod query;
pub mod search;
pub mod text;

pub use chat::{ChatResponse, ChatService};
pub use confidence::{analyze, ConfidenceReason, Verdict};
pub use config::{Config, ConfidenceConfig, DialogueConfig, LLMServiceConfig, RetrievalConfig};
pub use db::{BrandInfo, ConversationInfo, Database, DocumentInfo, DocumentStatus, IndexStats};
pub use dialogue::{DialoguePolicy, PolicyResponse, PolicyState, Role, Source, Turn};
pub use domain::DomainProfile;
pub use entity::{extract_known_context, KnownContext, MissingInfo};
pub use error::{Error, ManualRootError, Result};
pub use index::{build_contextual_chunks, IndexReport, Indexer};
pub use llm::{
    ChatMessage, CompletionOptions, Embedder, HttpEmbedder, HttpReranker, LLMClient,
    MetricsSnapshot, Reranker, VLLMClient,
};
pub use query::{enrich_query, expand_query, EnrichedQuery};
pub use search::{
    CandidateChunk, FilenameCache, HybridSearch, PhaseStats, SearchBackend, SearchOutcome,
};

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "manualroot";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "manualroot";
