pub mod key;
pub mod memory;
pub mod ttl;

pub use key::canonical_key;
pub use memory::{CacheStats, MemoryCache, DEFAULT_CAPACITY};
pub use ttl::TtlCache;
