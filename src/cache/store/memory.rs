use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheError, CacheStore};

/// 进程内缓存存储，未配置 Redis 时使用
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locked<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, (String, Option<Instant>)>) -> R,
    ) -> Result<R, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".into()))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.locked(|entries| match entries.get(key) {
            Some((_, Some(expires_at))) if *expires_at <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        let expires_at = ttl_secs
            .filter(|ttl| *ttl > 0)
            .map(|ttl| Instant::now() + Duration::from_secs(ttl));
        self.locked(|entries| {
            entries.insert(key.to_string(), (value.to_string(), expires_at));
        })
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.locked(|entries| {
            entries.remove(key);
        })
    }
}
