//! 数据结构定义

use std::time::Duration;

/// 单个限流规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// 时间窗口内的最大请求数
    pub limit: u32,
    /// 固定窗口长度
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_millis(60_000),
        }
    }
}

/// 计数表的键：客户端标识 + 路由
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client: String,
    pub route: String,
}

/// 某个键在当前窗口内的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_start: u64,
}

/// 限流检查结果
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 路由豁免，不计数
    Exempt,
    Allowed {
        /// 当前窗口内的请求计数（含本次）
        count: u32,
        limit: u32,
        remaining: u32,
        /// 距离窗口结束的时间
        reset_after: Duration,
    },
    Denied {
        count: u32,
        limit: u32,
        /// 建议重试等待时间，等于窗口剩余时间
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }
}

/// 向上取整到秒，用于响应头
pub fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
}
