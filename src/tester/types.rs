//! # 批次数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::classifier::{ResultCounts, ResultStatus};
use crate::provider::{ProbeOutcome, ProviderType};
use crate::utils::{hash_key, mask_key};

/// 一次批量校验请求
#[derive(Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// 服务商标识
    pub provider: String,
    pub model: String,
    /// 替换默认 base URL 的代理地址
    #[serde(default)]
    pub proxy_base_url: Option<String>,
    pub keys: Vec<String>,
    /// 未指定时取配置中的默认并发
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// 未指定时取配置中的默认重试次数
    #[serde(default)]
    pub retry_count: Option<u32>,
}

impl ValidationRequest {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            proxy_base_url: None,
            keys,
            concurrency: None,
            retry_count: None,
        }
    }

    #[must_use]
    pub fn with_proxy_base_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}

// 密钥原文不进入 Debug 输出
impl fmt::Debug for ValidationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRequest")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("proxy_base_url", &self.proxy_base_url)
            .field("keys", &format_args!("[{} keys]", self.keys.len()))
            .field("concurrency", &self.concurrency)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

/// 单个密钥的持久化结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedResult {
    pub test_id: String,
    pub provider: ProviderType,
    pub model: String,
    pub status: ResultStatus,
    pub error: Option<String>,
    pub is_rate_limit: bool,
    pub is_paid: Option<bool>,
    pub key_fingerprint: String,
    pub key_masked: String,
    pub tested_at: DateTime<Utc>,
}

impl ClassifiedResult {
    /// 由探测结果构建，原文密钥只用于计算指纹与脱敏形式
    #[must_use]
    pub fn from_outcome(
        test_id: &str,
        provider: ProviderType,
        model: &str,
        api_key: &str,
        outcome: &ProbeOutcome,
    ) -> Self {
        Self {
            test_id: test_id.to_string(),
            provider,
            model: model.to_string(),
            status: super::classifier::classify(outcome),
            error: outcome.error.clone(),
            is_rate_limit: outcome.is_rate_limit,
            is_paid: outcome.is_paid,
            key_fingerprint: hash_key(api_key),
            key_masked: mask_key(api_key),
            tested_at: Utc::now(),
        }
    }
}

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会话汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAggregate {
    pub test_id: String,
    pub provider: ProviderType,
    pub model: String,
    pub total_keys: usize,
    pub counts: ResultCounts,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionAggregate {
    /// 新建运行中的会话，计数归零
    #[must_use]
    pub fn running(test_id: String, provider: ProviderType, model: String, total_keys: usize) -> Self {
        Self {
            test_id,
            provider,
            model,
            total_keys,
            counts: ResultCounts::default(),
            status: SessionStatus::Running,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 完成后计数必须与总数一致
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        self.counts.total() == self.total_keys
    }
}

/// 批次返回给调用方的单项：分类结果加上原文密钥（仅用于即时展示）
#[derive(Clone, Serialize)]
pub struct BatchItem {
    pub key: String,
    #[serde(flatten)]
    pub result: ClassifiedResult,
}

impl fmt::Debug for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchItem")
            .field("key", &self.result.key_masked)
            .field("result", &self.result)
            .finish()
    }
}

/// 批次执行结果
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub test_id: String,
    pub total: usize,
    #[serde(rename = "results")]
    pub counts: ResultCounts,
    /// 按提交顺序排列
    pub items: Vec<BatchItem>,
}

/// 结果分页查询条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultQuery {
    pub status: Option<ResultStatus>,
    pub provider: Option<ProviderType>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl ResultQuery {
    pub const DEFAULT_PAGE_SIZE: u64 = 50;
    pub const MAX_PAGE_SIZE: u64 = 100;

    /// 页码从 1 开始，缺省或 0 视为 1
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// 每页条数，缺省 50，限制在 1..=100
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }

    #[must_use]
    pub fn matches(&self, result: &ClassifiedResult) -> bool {
        self.status.is_none_or(|s| s == result.status)
            && self.provider.is_none_or(|p| p == result.provider)
    }
}

/// 一页查询结果
#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub session: SessionAggregate,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<ClassifiedResult>,
}

/// 生成批次标识：`test_<毫秒时间戳>_<8位十六进制>`
#[must_use]
pub fn new_test_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("test_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}
