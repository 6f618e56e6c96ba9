use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::cache::chaos::{Admission, ChaosControl};
use crate::cache::store::CacheStore;

/// 读穿透缓存
///
/// 存储层的错误一律记录日志后按未命中或空操作处理，不会影响调用方；
/// 只有 `get_or_set` 中工厂函数的错误会原样返回。
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    chaos: Arc<ChaosControl>,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>, chaos: Arc<ChaosControl>) -> Self {
        Self { store, chaos }
    }

    pub fn chaos(&self) -> &Arc<ChaosControl> {
        &self.chaos
    }

    /// 读取缓存，任何失败都视为未命中
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.admitted("get", key) {
            return None;
        }

        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!("cache_hits_total").increment(1);
                    Some(value)
                }
                Err(e) => {
                    error!(key, error = %e, "Failed to decode cached value");
                    counter!("cache_errors_total", "op" => "decode").increment(1);
                    None
                }
            },
            Ok(None) => {
                counter!("cache_misses_total").increment(1);
                None
            }
            Err(e) => {
                error!(key, error = %e, "Failed to get cache key");
                counter!("cache_errors_total", "op" => "get").increment(1);
                None
            }
        }
    }

    /// 写入缓存，失败只记录日志
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: Option<u64>) {
        if !self.admitted("set", key) {
            return;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key, error = %e, "Failed to encode value for cache");
                counter!("cache_errors_total", "op" => "encode").increment(1);
                return;
            }
        };

        if let Err(e) = self.store.set(key, &raw, ttl_secs).await {
            error!(key, error = %e, "Failed to set cache key");
            counter!("cache_errors_total", "op" => "set").increment(1);
        }
    }

    /// 删除缓存，失败只记录日志
    pub async fn del(&self, key: &str) {
        if !self.admitted("del", key) {
            return;
        }

        if let Err(e) = self.store.del(key).await {
            error!(key, error = %e, "Failed to delete cache key");
            counter!("cache_errors_total", "op" => "del").increment(1);
        }
    }

    /// 先读缓存，未命中时调用 `factory` 计算并回写
    ///
    /// 缓存关闭或本次被注入失败时直接调用 `factory`，完全不访问存储。
    /// `factory` 出错时错误原样返回，且不写缓存。
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl_secs: Option<u64>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admitted("get_or_set", key) {
            return factory().await;
        }

        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await.inspect_err(|e| {
            debug!(key, error = %e, "Factory failed for cache key");
        })?;

        self.set(key, &value, ttl_secs).await;
        Ok(value)
    }

    fn admitted(&self, op: &'static str, key: &str) -> bool {
        match self.chaos.admit() {
            Admission::Proceed => true,
            Admission::Disabled => {
                debug!(op, key, "Cache disabled, operation skipped");
                false
            }
            Admission::InjectedFailure => {
                warn!(op, key, "Cache operation skipped due to injected failure");
                counter!("cache_chaos_skips_total", "op" => op).increment(1);
                false
            }
        }
    }
}
