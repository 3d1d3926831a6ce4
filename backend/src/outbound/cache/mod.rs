//! Cache adapters implementing the `InstanceCache` port.

mod memory;
mod redis_instance_cache;

pub use memory::{CacheSnapshot, InMemoryInstanceCache};
pub use redis_instance_cache::RedisInstanceCache;
