//! Configuration management

use crate::error::{ManualRootError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Hybrid retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Confidence classifier thresholds
    #[serde(default)]
    pub confidence: ConfidenceConfig,

    /// Clarification policy settings
    #[serde(default)]
    pub dialogue: DialogueConfig,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of the LLM service for chat/completions
    pub url: String,

    /// Model name for chat completions
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Base URL for embeddings service (can be different from LLM URL)
    #[serde(default)]
    pub embedding_url: Option<String>,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensions
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per call before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl LLMServiceConfig {
    /// Get the embeddings URL (falls back to main URL if not specified)
    pub fn embeddings_url(&self) -> &str {
        self.embedding_url.as_deref().unwrap_or(&self.url)
    }
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("MANUALROOT_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_chat_model(),
            embedding_url: std::env::var("MANUALROOT_EMBEDDING_URL").ok(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: std::env::var("MANUALROOT_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok()),
            api_key: std::env::var("MANUALROOT_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_chat_model() -> String {
    std::env::var("MANUALROOT_LLM_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_embedding_model() -> String {
    std::env::var("MANUALROOT_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "intfloat/multilingual-e5-base".to_string())
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

/// Hybrid retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks returned by a search
    pub limit: usize,
    /// Dense pool size = limit * multiplier
    pub pool_multiplier: usize,
    /// Minimum dense pool size
    pub pool_floor: usize,
    /// Minimum cosine similarity for the dense phase
    pub min_similarity: f64,
    /// Filename match score above which a document is force-injected
    pub filename_strong_threshold: f64,
    /// Maximum chunks per document in the final list
    pub diversity_cap: usize,
    /// Keywords embedded individually in the multi-query phase
    pub multi_query_keywords: usize,
    pub lexical_bonus_cap: f64,
    pub filename_bonus_cap: f64,
    pub content_bonus_cap: f64,
    /// Chunks fetched per injected document
    pub injected_per_document: usize,
    /// Page size used when scanning the document registry
    pub registry_page_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            pool_multiplier: 10,
            pool_floor: 100,
            min_similarity: 0.30,
            filename_strong_threshold: 0.5,
            diversity_cap: 3,
            multi_query_keywords: 3,
            lexical_bonus_cap: 0.24,
            filename_bonus_cap: 0.15,
            content_bonus_cap: 0.10,
            injected_per_document: 2,
            registry_page_size: 256,
        }
    }
}

impl RetrievalConfig {
    /// Dense pool size for a requested result count
    pub fn pool_size(&self, limit: usize) -> usize {
        (limit * self.pool_multiplier).max(self.pool_floor)
    }
}

/// Confidence classifier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub strong_with_terms: f64,
    pub strong: f64,
    pub clear_leader: f64,
    pub clear_leader_gap: f64,
    pub moderate_with_terms: f64,
    pub similar_docs_min: usize,
    pub similar_docs_spread: f64,
    pub low_score: f64,
    pub ambiguous_docs_min: usize,
    pub ambiguous_gap: f64,
    /// How many top chunks are scanned for query terms
    pub term_window: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            strong_with_terms: 0.70,
            strong: 0.75,
            clear_leader: 0.68,
            clear_leader_gap: 0.03,
            moderate_with_terms: 0.55,
            similar_docs_min: 5,
            similar_docs_spread: 0.05,
            low_score: 0.60,
            ambiguous_docs_min: 4,
            ambiguous_gap: 0.02,
            term_window: 15,
        }
    }
}

/// Clarification policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Clarification rounds before the policy must answer
    pub max_rounds: usize,
    /// Spread under which confident results count as near-tied
    pub near_tie_spread: f64,
    /// Distinct documents needed for a near-tie
    pub near_tie_min_docs: usize,
    /// Chunks handed to answer composition
    pub answer_context: usize,
    /// Rerank with the LLM before answering
    pub rerank: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            near_tie_spread: 0.05,
            near_tie_min_docs: 3,
            answer_context: 7,
            rerank: true,
        }
    }
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load config from an explicit path; missing file yields defaults
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    fn validate(&self) -> Result<()> {
        if self.retrieval.limit == 0 {
            return Err(ManualRootError::Config("retrieval.limit must be > 0".into()));
        }
        if self.retrieval.diversity_cap == 0 {
            return Err(ManualRootError::Config(
                "retrieval.diversity_cap must be > 0".into(),
            ));
        }
        if self.llm_service.max_retries == 0 {
            return Err(ManualRootError::Config(
                "llm_service.max_retries must be > 0".into(),
            ));
        }
        Ok(())
    }
}
