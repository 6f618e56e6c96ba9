//! 按 (客户端, 路由) 计数的固定窗口限流

pub mod clock;
pub mod limiter;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use limiter::{HEALTH_MARKER, RateLimiter, UNKNOWN_CLIENT};
pub use types::{Decision, RateLimitRule};

/// 后台定期清理过期计数，防止计数表无限增长
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            limiter.sweep();
        }
    })
}
