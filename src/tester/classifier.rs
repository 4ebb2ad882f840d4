//! # 结果归类
//!
//! 把探测结果折叠为三种终态之一，并维护无锁计数器。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::config::ConfigError;
use crate::error::ConfigResult;
use crate::provider::ProbeOutcome;

/// 密钥的终态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Valid,
    Invalid,
    RateLimited,
}

impl ResultStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::RateLimited => "rate_limited",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            "rate_limited" => Ok(Self::RateLimited),
            other => Err(ConfigError::InvalidField {
                field: "status",
                message: format!("'{other}' must be one of: valid, invalid, rate_limited"),
            }),
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 归类规则：有效优先，其次限流，其余均为无效
#[must_use]
pub const fn classify(outcome: &ProbeOutcome) -> ResultStatus {
    if outcome.valid {
        ResultStatus::Valid
    } else if outcome.is_rate_limit {
        ResultStatus::RateLimited
    } else {
        ResultStatus::Invalid
    }
}

/// 计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    pub valid: usize,
    pub invalid: usize,
    pub rate_limited: usize,
}

impl ResultCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.valid + self.invalid + self.rate_limited
    }
}

/// 批次运行期间的并发计数器
#[derive(Debug, Default)]
pub struct ResultCounters {
    valid: AtomicUsize,
    invalid: AtomicUsize,
    rate_limited: AtomicUsize,
}

impl ResultCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: ResultStatus) {
        let counter = match status {
            ResultStatus::Valid => &self.valid,
            ResultStatus::Invalid => &self.invalid,
            ResultStatus::RateLimited => &self.rate_limited,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> ResultCounts {
        ResultCounts {
            valid: self.valid.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}
