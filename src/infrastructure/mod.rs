// Core infrastructure modules
pub mod cache;                 // TTL cache and the global feed slot
pub mod clock;                 // Injectable time source
pub mod id_generator;          // Snowflake-style ID generation
pub mod middleware;            // Viewer context middleware and extractors
pub mod store;                 // Post store trait and implementations
pub mod viewer;                // Viewer context

// Re-export core infrastructure components
pub use cache::{CacheEntry, CacheStats, FeedCache, TtlCache, GLOBAL_FEED_KEY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use id_generator::IdGenerator;
pub use store::{MemoryPostStore, PostStore, SqlitePostStore};
pub use viewer::ViewerContext;
