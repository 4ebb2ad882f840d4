//! # 重试退避策略

use std::time::Duration;

use crate::config::RetryConfig;

/// 单个密钥的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（首次请求 + 重试次数）
    pub max_attempts: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, &RetryConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(retry_count: u32, config: &RetryConfig) -> Self {
        Self {
            max_attempts: retry_count.saturating_add(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// 第 `attempt` 次失败后是否还能再试
    #[must_use]
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 指数退避：`base * 2^(attempt-1)`，不超过上限
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2u64.pow(exponent))
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// 退避延迟加上最多 10% 的随机抖动
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_cap = u64::try_from(base.as_millis() / 10).unwrap_or(0);
        if jitter_cap == 0 {
            return base;
        }
        base + Duration::from_millis(fastrand::u64(0..=jitter_cap))
    }
}
