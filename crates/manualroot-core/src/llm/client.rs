//! HTTP client for external LLM services (vLLM, OpenAI, etc.)

use crate::config::LLMServiceConfig;
use crate::error::{ManualRootError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait for LLM service clients
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate chat completion
    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<String>;

    /// Generate embeddings for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn embedding_dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling options per call site
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionOptions {
    /// History-aware query rewriting
    pub const REWRITE: Self = Self {
        temperature: 0.0,
        max_tokens: 200,
    };

    /// Clarification, disambiguation and progressive questions
    pub const CLARIFICATION: Self = Self {
        temperature: 0.3,
        max_tokens: 500,
    };

    /// Final answer composition
    pub const ANSWER: Self = Self {
        temperature: 0.1,
        max_tokens: 4096,
    };

    /// Chunk relevance scoring
    pub const RERANK: Self = Self {
        temperature: 0.0,
        max_tokens: 2048,
    };
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

/// API metrics for monitoring
#[derive(Debug, Default)]
pub struct APIMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub retries: AtomicU64,
    pub quota_errors: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

/// Snapshot of API metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub retries: u64,
    pub quota_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_latency_ms: f64,
}

/// Backoff before the retry that follows `attempt` (1-based)
pub fn backoff_delay(config: &LLMServiceConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    let ms = config
        .retry_base_delay_ms
        .saturating_mul(factor)
        .min(config.retry_max_delay_ms);
    Duration::from_millis(ms)
}

/// vLLM/OpenAI-compatible client
pub struct VLLMClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    embedding_dimensions: usize,
    cache: super::cache::LLMCache,
    metrics: APIMetrics,
}

impl VLLMClient {
    /// Create new client from configuration
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let embedding_dimensions = config.embedding_dimensions.unwrap_or(768);

        Ok(Self {
            http_client,
            config,
            embedding_dimensions,
            cache: super::cache::LLMCache::new(),
            metrics: APIMetrics::default(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(LLMServiceConfig::default())
    }

    /// Get current API metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.total_requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
            retries: self.metrics.retries.load(Ordering::Relaxed),
            quota_errors: self.metrics.quota_errors.load(Ordering::Relaxed),
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.metrics.cache_misses.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                self.metrics.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Run `op` with bounded exponential backoff.
    /// Quota exhaustion and non-retryable errors return immediately.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
                    if matches!(e, ManualRootError::QuotaExhausted(_)) {
                        self.metrics.quota_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("{} hit quota limit, not retrying: {}", what, e);
                        return Err(e);
                    }
                    if !e.is_retryable() || attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = backoff_delay(&self.config, attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what,
                        attempt,
                        self.config.max_retries,
                        delay,
                        e
                    );
                    self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn post_json<B, R>(&self, service: &str, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut req = self.http_client.post(url).json(body);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ManualRootError::from_status(service, status, &text));
        }
        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[async_trait]
impl LLMClient for VLLMClient {
    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<String> {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let messages_json = serde_json::to_string(&messages)?;
        let options_json = serde_json::to_string(&options)?;
        let cache_key =
            super::cache::chat_cache_key(&self.config.model, &messages_json, &options_json);

        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!("Cache hit for chat completion");
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);

        let request = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let url = format!("{}/v1/chat/completions", self.config.url);

        let response: ChatResponse = self
            .with_retry("chat completion", || {
                self.post_json("LLM service", &url, &request)
            })
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ManualRootError::Llm("No response from LLM".to_string()))?;

        self.cache.set(cache_key, content.clone());
        self.metrics
            .total_latency_ms
            .fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);

        Ok(content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ManualRootError::Llm("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut uncached_texts = Vec::new();
        let mut uncached_indices = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = super::cache::embedding_cache_key(&self.config.embedding_model, text);
            if let Some(embedding) = self
                .cache
                .get(&key)
                .and_then(|c| serde_json::from_str::<Vec<f32>>(&c).ok())
            {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                results.push(Some(embedding));
                continue;
            }
            self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
            results.push(None);
            uncached_texts.push(text.clone());
            uncached_indices.push(i);
        }

        if !uncached_texts.is_empty() {
            tracing::debug!(
                "Embedding batch: {} cached, {} to fetch",
                texts.len() - uncached_texts.len(),
                uncached_texts.len()
            );

            let request = EmbedRequest {
                model: &self.config.embedding_model,
                input: &uncached_texts,
            };
            let url = format!("{}/v1/embeddings", self.config.embeddings_url());

            let response: EmbedResponse = self
                .with_retry("embedding", || {
                    self.post_json("Embedding service", &url, &request)
                })
                .await?;

            if response.data.len() != uncached_texts.len() {
                return Err(ManualRootError::Llm(format!(
                    "Embedding service returned {} vectors for {} inputs",
                    response.data.len(),
                    uncached_texts.len()
                )));
            }

            for ((data, idx), text) in response
                .data
                .into_iter()
                .zip(uncached_indices)
                .zip(&uncached_texts)
            {
                if let Ok(json) = serde_json::to_string(&data.embedding) {
                    let key =
                        super::cache::embedding_cache_key(&self.config.embedding_model, text);
                    self.cache.set(key, json);
                }
                results[idx] = Some(data.embedding);
            }
        }

        self.metrics
            .total_latency_ms
            .fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| ManualRootError::Llm("Missing embedding".to_string())))
            .collect()
    }

    fn embedding_dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LLMServiceConfig {
        LLMServiceConfig {
            url: "http://localhost:1".into(),
            model: "m".into(),
            embedding_url: None,
            embedding_model: "e".into(),
            embedding_dimensions: Some(4),
            api_key: None,
            timeout_secs: 5,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            retry_max_delay_ms: 10_000,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let c = config();
        assert_eq!(backoff_delay(&c, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&c, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&c, 3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(&c, 4), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(&c, 40), Duration::from_millis(10_000));
    }

    #[test]
    fn test_call_site_options() {
        assert_eq!(CompletionOptions::REWRITE.max_tokens, 200);
        assert_eq!(CompletionOptions::CLARIFICATION.temperature, 0.3);
        assert_eq!(CompletionOptions::ANSWER.max_tokens, 4096);
    }
}
