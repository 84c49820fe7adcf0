mod articles;
mod content_cache;
mod feeds;
mod preferences;
mod reader_state;
mod saved;
mod schema;
mod types;

pub use content_cache::{url_hash, DEFAULT_TTL_HOURS};
pub use schema::Database;
pub use types::{CacheStats, CachedResult, DatabaseError, LinkList};
