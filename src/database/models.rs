/*!
 * Row types stored in the cache database.
 */

use serde::{Deserialize, Serialize};

/// One persisted translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Hex SHA-256 of the normalized text and language pair
    pub cache_key: String,
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl CacheRecord {
    pub fn new(
        cache_key: String,
        source_text: String,
        source_language: String,
        target_language: String,
        translated_text: String,
    ) -> Self {
        Self {
            cache_key,
            source_text,
            source_language,
            target_language,
            translated_text,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
