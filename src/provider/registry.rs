use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::network::NetworkError;
use crate::error::provider::ProviderError;
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

use super::provider_strategy::{ClaudeAdapter, GeminiAdapter, OpenAiCompatibleAdapter};
use super::traits::ProviderAdapter;
use super::types::ProviderType;

const USER_AGENT: &str = concat!("api-key-tester/", env!("CARGO_PKG_VERSION"));

/// 服务商标识到适配器的映射
///
/// 构建一次后只读，所有适配器共享同一个 HTTP 客户端。
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderType, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// 按配置构建完整注册表
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.tester.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;
        Self::with_client(client, config)
    }

    /// 使用外部提供的客户端构建注册表
    pub fn with_client(client: Client, config: &AppConfig) -> Result<Self> {
        let mut adapters: HashMap<ProviderType, Arc<dyn ProviderAdapter>> = HashMap::new();

        for provider in ProviderType::ALL {
            let base_url = match config.provider_base_url(provider.as_str()) {
                Some(url) => {
                    url::Url::parse(url).map_err(|e| ProviderError::InvalidBaseUrl {
                        provider: provider.as_str().to_string(),
                        message: e.to_string(),
                    })?;
                    url.to_string()
                }
                None => provider.default_base_url().to_string(),
            };

            let adapter: Arc<dyn ProviderAdapter> = match provider {
                ProviderType::Claude => Arc::new(ClaudeAdapter::new(client.clone(), base_url)),
                ProviderType::Gemini => Arc::new(GeminiAdapter::new(client.clone(), base_url)),
                _ => Arc::new(OpenAiCompatibleAdapter::new(
                    provider,
                    client.clone(),
                    base_url,
                )),
            };
            adapters.insert(provider, adapter);
        }

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Registry,
            "registry_built",
            "服务商适配器注册完成",
            providers = adapters.len()
        );

        Ok(Self { adapters })
    }

    /// 空注册表，配合 [`Self::register`] 使用
    #[must_use]
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// 注册或替换某个服务商的适配器
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider_type(), adapter);
    }

    pub fn resolve(&self, provider: ProviderType) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| ProviderError::AdapterNotRegistered(provider.as_str().to_string()).into())
    }

    /// 已注册的服务商，按白名单顺序
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderType> {
        ProviderType::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEndpointConfig;
    use crate::error::TesterError;

    #[test]
    fn built_in_adapters_resolve() {
        let registry = AdapterRegistry::new(&AppConfig::default()).unwrap();

        assert_eq!(registry.providers(), ProviderType::ALL.to_vec());
        for provider in ProviderType::ALL {
            let adapter = registry.resolve(provider).unwrap();
            assert_eq!(adapter.provider_type(), provider);
        }
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "claude".to_string(),
            ProviderEndpointConfig {
                base_url: "::nope::".to_string(),
            },
        );
        let err = AdapterRegistry::new(&config).unwrap_err();
        assert!(matches!(
            err,
            TesterError::Provider(ProviderError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn empty_registry_reports_missing_adapter() {
        let registry = AdapterRegistry::empty();
        assert!(registry.providers().is_empty());
        let err = registry.resolve(ProviderType::Xai).unwrap_err();
        assert!(!err.is_configuration());
    }
}
