pub mod error;
pub mod keys;
pub mod redis_cache;

pub use error::CacheError;
pub use redis_cache::RedisHotCache;
