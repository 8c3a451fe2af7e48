/*!
 * SQLite persistence for the translation cache.
 *
 * - `connection`: connection handling and async access
 * - `schema`: table definitions
 * - `models`: row types
 * - `repository`: cache lookups and appends
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::CacheRecord;
pub use repository::CacheRepository;
