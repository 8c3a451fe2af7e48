/*!
 * Translation caching functionality.
 *
 * Translations are content-addressed by a SHA-256 of the normalized source
 * text and the language pair. Entries are immutable once written and only
 * disappear on an explicit `clear`. Concurrent requests for the same key share
 * a single translator call through a per-key `OnceCell`.
 */

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::database::{CacheRecord, CacheRepository};
use crate::errors::{CacheError, TranslateError};
use crate::language_utils;

/// Hex SHA-256 of (trimmed text, source language, target language)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(source_text).as_bytes());
        hasher.update([0u8]);
        hasher.update(language_key(source_language).as_bytes());
        hasher.update([0u8]);
        hasher.update(language_key(target_language).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `ger`, `deu` and `de-DE` share one key
fn language_key(code: &str) -> String {
    language_utils::normalize_language(code).unwrap_or_else(|_| code.trim().to_lowercase())
}

/// Only trailing whitespace is insignificant for cache identity
fn normalize(text: &str) -> &str {
    text.trim_end()
}

/// An immutable cached translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub translated: String,
    pub created_at: DateTime<Utc>,
}

/// How a `resolve_with` call was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResolution {
    /// Served from the cache, or from another caller's in-flight request
    Hit(String),
    /// This caller ran the translator
    Translated(String),
}

impl CacheResolution {
    pub fn into_text(self) -> String {
        match self {
            CacheResolution::Hit(text) | CacheResolution::Translated(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    pub translator_calls: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

type PendingCell = Arc<OnceCell<Result<String, TranslateError>>>;

/// Translation cache for storing and retrieving translations
#[derive(Clone)]
pub struct TranslationCache {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<CacheEntry>>>>,

    /// In-flight translator calls, one per key
    pending: Arc<Mutex<HashMap<CacheKey, PendingCell>>>,

    store: Option<CacheRepository>,

    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create an in-memory translation cache
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            store: None,
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            enabled,
        }
    }

    /// Create a cache backed by a persisted store
    pub fn with_store(store: CacheRepository) -> Self {
        Self {
            store: Some(store),
            ..Self::new(true)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a translation from the cache
    pub async fn get(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(source_text, source_language, target_language);
        let found = self.lookup(&key).await;
        self.record_lookup(found.is_some(), source_text, source_language, target_language);
        found
    }

    /// Store a translation in the cache. An existing entry is never replaced.
    pub async fn put(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        translated: &str,
    ) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::new(source_text, source_language, target_language);
        self.insert_memory(&key, translated.to_string(), Utc::now());

        debug!(
            "Cached translation for '{}' ({} -> {})",
            truncate_text(source_text, 30),
            source_language,
            target_language
        );

        if let Some(store) = &self.store {
            let record = CacheRecord::new(
                key.as_str().to_string(),
                normalize(source_text).to_string(),
                source_language.to_string(),
                target_language.to_string(),
                translated.to_string(),
            );
            if let Err(e) = store.insert(&record).await {
                warn!("{}", CacheError::Io(e.to_string()));
            }
        }
    }

    /// Resolve a translation through the cache, calling the translator at most
    /// once per key across concurrent callers.
    ///
    /// Callers that joined an in-flight request are reported as hits. A failed
    /// call is handed to the callers already waiting on it but is not cached.
    pub async fn resolve_with<F, Fut>(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        call: F,
    ) -> Result<CacheResolution, TranslateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, TranslateError>>,
    {
        if !self.enabled {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return call().await.map(CacheResolution::Translated);
        }

        let key = CacheKey::new(source_text, source_language, target_language);

        if let Some(found) = self.lookup(&key).await {
            self.record_lookup(true, source_text, source_language, target_language);
            return Ok(CacheResolution::Hit(found));
        }

        let cell = {
            let mut pending = self.pending.lock();
            // A finished call publishes to memory before leaving `pending`
            if let Some(entry) = self.entries.read().get(&key) {
                let translated = entry.translated.clone();
                drop(pending);
                self.record_lookup(true, source_text, source_language, target_language);
                return Ok(CacheResolution::Hit(translated));
            }
            pending
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let ran = AtomicBool::new(false);
        let result = cell
            .get_or_init(|| async {
                ran.store(true, Ordering::SeqCst);
                self.calls.fetch_add(1, Ordering::SeqCst);
                let result = call().await;
                if let Ok(translated) = &result {
                    self.put(source_text, source_language, target_language, translated)
                        .await;
                }
                result
            })
            .await
            .clone();

        let ran = ran.load(Ordering::SeqCst);
        if ran {
            let mut pending = self.pending.lock();
            if pending.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                pending.remove(&key);
            }
        }

        self.record_lookup(!ran, source_text, source_language, target_language);

        result.map(|translated| {
            if ran {
                CacheResolution::Translated(translated)
            } else {
                CacheResolution::Hit(translated)
            }
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            entries: self.len(),
            translator_calls: self.calls.load(Ordering::SeqCst),
        }
    }

    /// Clear memory, counters and the persisted store
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        self.hits.store(0, Ordering::SeqCst);
        self.misses.store(0, Ordering::SeqCst);
        self.calls.store(0, Ordering::SeqCst);

        if let Some(store) = &self.store {
            let deleted = store
                .clear()
                .await
                .map_err(|e| CacheError::Io(e.to_string()))?;
            debug!("Removed {} persisted cache entries", deleted);
        }

        debug!("Translation cache cleared");
        Ok(())
    }

    /// Number of entries held in memory
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn lookup(&self, key: &CacheKey) -> Option<String> {
        if let Some(entry) = self.entries.read().get(key) {
            return Some(entry.translated.clone());
        }

        let store = self.store.as_ref()?;
        match store.get(key.as_str()).await {
            Ok(Some(record)) => {
                let created_at = DateTime::parse_from_rfc3339(&record.created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                self.insert_memory(key, record.translated_text.clone(), created_at);
                Some(record.translated_text)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("{}; falling back to translator", CacheError::Io(e.to_string()));
                None
            }
        }
    }

    fn insert_memory(&self, key: &CacheKey, translated: String, created_at: DateTime<Utc>) {
        self.entries
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CacheEntry { translated, created_at }));
    }

    fn record_lookup(
        &self,
        hit: bool,
        source_text: &str,
        source_language: &str,
        target_language: &str,
    ) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Cache {} for '{}' ({} -> {})",
            if hit { "hit" } else { "miss" },
            truncate_text(source_text, 30),
            source_language,
            target_language
        );
    }
}

/// Truncate text for logging
fn truncate_text(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
