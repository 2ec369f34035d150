//! Filename registry cache and fuzzy filename matching

use super::SearchBackend;
use crate::error::Result;
use crate::text::{compact, normalize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Words that never identify a manual on their own
const FILENAME_STOPWORDS: &[&str] = &[
    "de", "do", "da", "dos", "das", "no", "na", "nos", "nas", "em", "o", "a", "os", "as", "e",
    "ou", "um", "uma", "com", "para", "por", "que", "qual", "como", "pdf",
];

/// Per-brand document id to filename map.
///
/// Entries are loaded lazily from the backend registry and dropped by
/// [`FilenameCache::invalidate`], which every index mutation must call.
pub struct FilenameCache {
    entries: RwLock<HashMap<String, Arc<HashMap<i64, String>>>>,
    page_size: usize,
}

impl FilenameCache {
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Cached map for `brand`, paging through the registry on a miss
    pub fn get_or_load(
        &self,
        backend: &dyn SearchBackend,
        brand: &str,
    ) -> Result<Arc<HashMap<i64, String>>> {
        if let Ok(entries) = self.entries.read() {
            if let Some(map) = entries.get(brand) {
                return Ok(Arc::clone(map));
            }
        }

        let mut map = HashMap::new();
        let mut offset = 0;
        loop {
            let page = backend.list_documents(brand, offset, self.page_size)?;
            let count = page.len();
            for entry in page {
                map.insert(entry.id, entry.filename);
            }
            if count < self.page_size {
                break;
            }
            offset += count;
        }
        tracing::debug!("Loaded {} filenames for brand {}", map.len(), brand);

        let map = Arc::new(map);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(brand.to_string(), Arc::clone(&map));
        }
        Ok(map)
    }

    /// Drop the cached map of one brand
    pub fn invalidate(&self, brand: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(brand);
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn is_cached(&self, brand: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(brand))
            .unwrap_or(false)
    }
}

impl Default for FilenameCache {
    fn default() -> Self {
        Self::new(crate::config::RetrievalConfig::default().registry_page_size)
    }
}

/// Filename without an upload-id prefix or extension
pub fn display_name(filename: &str) -> &str {
    let is_upload_id =
        |p: &str| p.len() >= 32 && p.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    let name = match filename.split_once('_') {
        Some((prefix, rest)) if is_upload_id(prefix) => rest,
        _ => filename,
    };
    let is_extension =
        |e: &str| !e.is_empty() && e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric());
    match name.rsplit_once('.') {
        Some((stem, ext)) if is_extension(ext) => stem,
        _ => name,
    }
}

/// Fuzzy match between a query and a filename in `[0, 1]`.
///
/// Query tokens (stopwords dropped) are looked up in both the spaced and the
/// whitespace-collapsed filename; adjacent query tokens are also tried glued
/// together so "xo 508" finds "XO508". Tokens carrying digits weigh double.
pub fn filename_match_score(filename: &str, query: &str) -> f64 {
    let name = normalize(display_name(filename));
    let name_compact = name.replace(' ', "");
    let name_tokens: Vec<&str> = name.split_whitespace().collect();

    let query_tokens: Vec<String> = normalize(query)
        .split_whitespace()
        .filter(|t| !FILENAME_STOPWORDS.contains(t))
        .map(str::to_string)
        .collect();
    if query_tokens.is_empty() || name_compact.is_empty() {
        return 0.0;
    }

    let query_compact = compact(query);
    if query_compact.len() >= 4 && name_compact.contains(&query_compact) {
        return 1.0;
    }

    let weight = |t: &str| if t.chars().any(|c| c.is_ascii_digit()) { 2.0 } else { 1.0 };
    let token_hit = |t: &str| {
        if t.len() >= 3 {
            name_compact.contains(t)
        } else {
            name_tokens.contains(&t)
        }
    };

    let mut matched = vec![false; query_tokens.len()];
    for (i, token) in query_tokens.iter().enumerate() {
        if token_hit(token) {
            matched[i] = true;
        }
    }
    for i in 0..query_tokens.len().saturating_sub(1) {
        let glued = format!("{}{}", query_tokens[i], query_tokens[i + 1]);
        if glued.len() >= 3 && name_compact.contains(&glued) {
            matched[i] = true;
            matched[i + 1] = true;
        }
    }

    let total: f64 = query_tokens.iter().map(|t| weight(t)).sum();
    let hit: f64 = query_tokens
        .iter()
        .zip(&matched)
        .filter(|(_, m)| **m)
        .map(|(t, _)| weight(t))
        .sum();
    hit / total
}
