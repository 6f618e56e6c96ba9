//! 缓存故障注入
//!
//! 运行时可关闭缓存，或按概率让单次缓存操作模拟失败。
//! 每次操作独立抽样，不修改共享状态。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ChaosError {
    #[error("Probability must be between 0 and 1, got {0}")]
    InvalidProbability(f64),
}

/// [0, 1) 区间内的随机数来源
pub trait ChaosRoll: Send + Sync {
    fn roll(&self) -> f64;
}

/// 默认使用线程本地随机数
#[derive(Debug, Default)]
pub struct ThreadRngRoll;

impl ChaosRoll for ThreadRngRoll {
    fn roll(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// 固定返回同一个值，测试用
#[derive(Debug, Clone, Copy)]
pub struct FixedRoll(pub f64);

impl ChaosRoll for FixedRoll {
    fn roll(&self) -> f64 {
        self.0
    }
}

/// 单次缓存操作是否放行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    /// 缓存被关闭
    Disabled,
    /// 本次调用被注入失败
    InjectedFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosStatus {
    pub cache_enabled: bool,
    pub failure_probability: f64,
}

/// 共享的故障注入状态
pub struct ChaosControl {
    cache_enabled: AtomicBool,
    // f64 的位模式
    failure_probability: AtomicU64,
    roll: Box<dyn ChaosRoll>,
}

impl ChaosControl {
    pub fn new(failure_probability: f64) -> Result<Self, ChaosError> {
        Self::with_roll(failure_probability, Box::new(ThreadRngRoll))
    }

    pub fn with_roll(failure_probability: f64, roll: Box<dyn ChaosRoll>) -> Result<Self, ChaosError> {
        validate_probability(failure_probability)?;
        Ok(Self {
            cache_enabled: AtomicBool::new(true),
            failure_probability: AtomicU64::new(failure_probability.to_bits()),
            roll,
        })
    }

    pub fn toggle_enabled(&self, enabled: bool) {
        self.cache_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Cache toggled");
    }

    pub fn set_failure_probability(&self, probability: f64) -> Result<(), ChaosError> {
        validate_probability(probability)?;
        self.failure_probability
            .store(probability.to_bits(), Ordering::SeqCst);
        tracing::info!(probability, "Cache failure probability updated");
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    pub fn failure_probability(&self) -> f64 {
        f64::from_bits(self.failure_probability.load(Ordering::SeqCst))
    }

    pub fn status(&self) -> ChaosStatus {
        ChaosStatus {
            cache_enabled: self.is_enabled(),
            failure_probability: self.failure_probability(),
        }
    }

    /// 为一次缓存操作抽样
    pub fn admit(&self) -> Admission {
        if !self.is_enabled() {
            return Admission::Disabled;
        }
        let probability = self.failure_probability();
        if probability > 0.0 && self.roll.roll() < probability {
            return Admission::InjectedFailure;
        }
        Admission::Proceed
    }
}

impl fmt::Debug for ChaosControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosControl")
            .field("cache_enabled", &self.is_enabled())
            .field("failure_probability", &self.failure_probability())
            .finish()
    }
}

fn validate_probability(probability: f64) -> Result<(), ChaosError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(ChaosError::InvalidProbability(probability))
    }
}
