//! LLM response caching to reduce API calls

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory TTL cache for completions and embeddings
pub struct LLMCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl LLMCache {
    /// Cache with a one hour TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(3600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: 4096,
        }
    }

    /// Get cached value if present and not expired
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        (Instant::now() < entry.expires_at).then(|| entry.value.clone())
    }

    pub fn set(&self, key: String, value: String) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.len() >= self.max_entries {
            let now = Instant::now();
            entries.retain(|_, e| now < e.expires_at);
            if entries.len() >= self.max_entries {
                entries.clear();
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LLMCache {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache key for embeddings
pub fn embedding_cache_key(model: &str, text: &str) -> String {
    format!("embed:{}:{}", model, digest(&[model, text]))
}

/// Cache key for chat completions; sampling options are part of the key
pub fn chat_cache_key(model: &str, messages: &str, options: &str) -> String {
    format!("chat:{}:{}", model, digest(&[model, messages, options]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic() {
        let cache = LLMCache::new();
        cache.set("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = LLMCache::with_ttl(Duration::from_millis(50));
        cache.set("key1".to_string(), "value1".to_string());
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_chat_key_depends_on_options() {
        let a = chat_cache_key("m", "[]", "t=0.0");
        let b = chat_cache_key("m", "[]", "t=0.3");
        assert_ne!(a, b);
        assert_eq!(a, chat_cache_key("m", "[]", "t=0.0"));
        assert_ne!(embedding_cache_key("m", "a"), embedding_cache_key("m", "b"));
    }
}
