/*!
 * Translation orchestration between the parsers and the translator backends.
 *
 * - `core`: `TranslationService`, resolving one unit through cache and translator
 * - `batch`: bounded concurrent resolution of a file's units
 * - `cache`: content-addressed, single-flight translation cache
 * - `filters`: eligibility rules producing `Skipped` outcomes
 * - `retry`: backoff policy for transient translator errors
 * - `concurrency`: global rate limiter and run cancellation
 */

pub use self::batch::BatchTranslator;
pub use self::cache::{CacheResolution, CacheStats, TranslationCache};
pub use self::concurrency::{CancellationFlag, RateLimiter};
pub use self::core::TranslationService;
pub use self::filters::UnitFilter;
pub use self::retry::RetryPolicy;

pub mod batch;
pub mod cache;
pub mod concurrency;
pub mod core;
pub mod filters;
pub mod retry;
