/*!
 * Repository for the persisted translation cache.
 *
 * The table is append-only: `insert` never overwrites an existing key, so
 * concurrent writers of the same translation cannot create duplicates.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::CacheRecord;

/// Repository for cache rows
#[derive(Clone)]
pub struct CacheRepository {
    db: DatabaseConnection,
}

impl CacheRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Look up a translation by cache key
    pub async fn get(&self, cache_key: &str) -> Result<Option<CacheRecord>> {
        let cache_key = cache_key.to_string();

        self.db
            .execute_async(move |conn| {
                let record = conn
                    .query_row(
                        r#"
                        SELECT cache_key, source_text, source_language, target_language,
                               translated_text, created_at
                        FROM translation_cache
                        WHERE cache_key = ?1
                        "#,
                        [&cache_key],
                        |row| {
                            Ok(CacheRecord {
                                cache_key: row.get(0)?,
                                source_text: row.get(1)?,
                                source_language: row.get(2)?,
                                target_language: row.get(3)?,
                                translated_text: row.get(4)?,
                                created_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
    }

    /// Append a translation; returns false when the key already existed
    pub async fn insert(&self, record: &CacheRecord) -> Result<bool> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                let inserted = conn.execute(
                    r#"
                    INSERT OR IGNORE INTO translation_cache (
                        cache_key, source_text, source_language, target_language,
                        translated_text, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        record.cache_key,
                        record.source_text,
                        record.source_language,
                        record.target_language,
                        record.translated_text,
                        record.created_at,
                    ],
                )?;
                if inserted == 0 {
                    debug!("Cache key {} already persisted", &record.cache_key[..12.min(record.cache_key.len())]);
                }
                Ok(inserted > 0)
            })
            .await
    }

    pub async fn count(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?)
            })
            .await
    }

    /// Delete every cached translation
    pub async fn clear(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                let deleted = conn.execute("DELETE FROM translation_cache", [])?;
                Ok(deleted as i64)
            })
            .await
    }
}
