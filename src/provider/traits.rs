use async_trait::async_trait;

use super::probe::ProbeOutcome;
use super::types::ProviderType;

/// 服务商探测适配器
///
/// 每次 `probe` 只发出一个最小请求，并把任何失败折叠进 [`ProbeOutcome`]。
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    fn provider_type(&self) -> ProviderType;

    async fn probe(
        &self,
        api_key: &str,
        model: &str,
        proxy_base_url: Option<&str>,
    ) -> ProbeOutcome;
}
