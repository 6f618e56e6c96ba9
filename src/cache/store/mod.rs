//! 缓存存储门面
//!
//! 只提供 get / set / del 三个操作，底层错误原样返回，
//! 由 [`ReadThroughCache`](crate::cache::ReadThroughCache) 负责吸收。

mod memory;
mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryCacheStore;
pub use self::redis::RedisCacheStore;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 未命中返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}
