//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::error::config::ConfigError;

/// 单批次密钥数量的硬上限，配置只能调低
pub const MAX_KEYS_PER_BATCH: usize = 1000;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    #[serde(default)]
    pub database: super::DatabaseConfig,
    /// 批量测试配置
    #[serde(default)]
    pub tester: TesterConfig,
    /// 重试退避配置
    #[serde(default)]
    pub retry: RetryConfig,
    /// 服务商端点覆盖（键为 provider id）
    #[serde(default)]
    pub providers: HashMap<String, ProviderEndpointConfig>,
}

/// 批量测试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// 请求未指定时的并发数
    pub default_concurrency: usize,
    /// 并发上限，超出部分会被截断
    pub max_concurrency: usize,
    /// 请求未指定时的单密钥重试次数
    pub default_retry_count: u32,
    /// 单批次最大密钥数
    pub max_keys_per_batch: usize,
    /// 单次探测请求超时（秒）
    pub request_timeout_secs: u64,
    /// 整批超时（秒），为空表示不限
    pub batch_timeout_secs: Option<u64>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 5,
            max_concurrency: 50,
            default_retry_count: 2,
            max_keys_per_batch: MAX_KEYS_PER_BATCH,
            request_timeout_secs: 30,
            batch_timeout_secs: None,
        }
    }
}

impl TesterConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }
}

/// 重试退避配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 首次重试延迟（毫秒）
    pub base_delay_ms: u64,
    /// 单次延迟上限（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

/// 服务商端点覆盖
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    /// 替换默认 base URL
    pub base_url: String,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid("database.url cannot be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        let tester = &self.tester;
        if tester.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "tester.max_concurrency must be greater than 0".to_string(),
            ));
        }
        if tester.default_concurrency == 0 || tester.default_concurrency > tester.max_concurrency {
            return Err(ConfigError::Invalid(format!(
                "tester.default_concurrency must be within 1..={}",
                tester.max_concurrency
            )));
        }
        if tester.max_keys_per_batch == 0 || tester.max_keys_per_batch > MAX_KEYS_PER_BATCH {
            return Err(ConfigError::Invalid(format!(
                "tester.max_keys_per_batch must be within 1..={MAX_KEYS_PER_BATCH}"
            )));
        }
        if tester.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tester.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if tester.batch_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "tester.batch_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms cannot exceed retry.max_delay_ms".to_string(),
            ));
        }

        for (provider, endpoint) in &self.providers {
            url::Url::parse(&endpoint.base_url).map_err(|e| {
                ConfigError::Invalid(format!("providers.{provider}.base_url is invalid: {e}"))
            })?;
        }

        Ok(())
    }

    /// 获取服务商的 base URL 覆盖
    #[must_use]
    pub fn provider_base_url(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider).map(|p| p.base_url.as_str())
    }
}
