//! 固定窗口限流器
//!
//! 计数表保存在进程内存中，所有读写都在同一把锁内完成，
//! 同一键的并发请求不会读到相同的计数。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::rate_limit::clock::Clock;
use crate::rate_limit::types::{Decision, RateLimitKey, RateLimitRecord, RateLimitRule};

/// 无法识别客户端时共用的标识
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 路径中包含该片段的请求不限流
pub const HEALTH_MARKER: &str = "/health";

pub struct RateLimiter {
    default_rule: RateLimitRule,
    route_rules: HashMap<String, RateLimitRule>,
    skip_prefixes: Vec<String>,
    max_keys: usize,
    trust_proxy: bool,
    records: Mutex<HashMap<RateLimitKey, RateLimitRecord>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(default_rule: RateLimitRule, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_rule,
            route_rules: HashMap::new(),
            skip_prefixes: Vec::new(),
            max_keys: usize::MAX,
            trust_proxy: false,
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            RateLimitRule::new(config.rate_limit_requests, config.rate_limit_window()),
            clock,
        )
        .with_max_keys(config.rate_limit_max_keys)
        .trust_proxy(config.rate_limit_trust_proxy)
    }

    /// 为指定路由设置独立规则
    pub fn with_route_rule(mut self, route: impl Into<String>, rule: RateLimitRule) -> Self {
        self.route_rules.insert(route.into(), rule);
        self
    }

    /// 以该前缀开头的路由跳过限流
    pub fn skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// 位于反向代理之后时才信任 X-Real-IP / X-Forwarded-For
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }

    pub fn rule_for(&self, route: &str) -> RateLimitRule {
        self.route_rules
            .get(route)
            .copied()
            .unwrap_or(self.default_rule)
    }

    pub fn is_exempt(&self, route: &str) -> bool {
        route.contains(HEALTH_MARKER)
            || self
                .skip_prefixes
                .iter()
                .any(|prefix| route.starts_with(prefix.as_str()))
    }

    /// 检查并记录一次请求
    pub fn check_and_record(&self, client: Option<&str>, route: &str) -> Decision {
        if self.is_exempt(route) {
            return Decision::Exempt;
        }

        let rule = self.rule_for(route);
        let window_ms = rule.window_millis();
        let key = RateLimitKey {
            client: client
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNKNOWN_CLIENT)
                .to_string(),
            route: route.to_string(),
        };

        let now = self.clock.now_millis();
        let mut records = self.lock();

        if !records.contains_key(&key) && records.len() >= self.max_keys {
            self.evict_for_insert(&mut records, now);
        }

        let record = records.entry(key).or_insert(RateLimitRecord {
            count: 0,
            window_start: now,
        });

        // 窗口过期则整体重置，不保留已过去的部分
        if now.saturating_sub(record.window_start) > window_ms {
            record.count = 0;
            record.window_start = now;
        }

        record.count = record.count.saturating_add(1);

        let elapsed = now.saturating_sub(record.window_start);
        let left_ms = window_ms.saturating_sub(elapsed);

        if record.count > rule.limit {
            Decision::Denied {
                count: record.count,
                limit: rule.limit,
                retry_after: Duration::from_millis(left_ms.max(1)),
            }
        } else {
            Decision::Allowed {
                count: record.count,
                limit: rule.limit,
                remaining: rule.limit - record.count,
                reset_after: Duration::from_millis(left_ms),
            }
        }
    }

    /// 清理窗口已过期的记录，返回清理数量
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|key, record| !self.is_expired(key, record, now));
        let removed = before - records.len();
        if removed > 0 {
            debug!(removed, remaining = records.len(), "Swept expired rate limit records");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, key: &RateLimitKey, record: &RateLimitRecord, now: u64) -> bool {
        now.saturating_sub(record.window_start) > self.rule_for(&key.route).window_millis()
    }

    // 表已满：先清理过期记录，仍然满则淘汰窗口最早的记录
    fn evict_for_insert(&self, records: &mut HashMap<RateLimitKey, RateLimitRecord>, now: u64) {
        records.retain(|key, record| !self.is_expired(key, record, now));
        while records.len() >= self.max_keys {
            let oldest = records
                .iter()
                .min_by_key(|(_, record)| record.window_start)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    records.remove(&key);
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RateLimitKey, RateLimitRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
