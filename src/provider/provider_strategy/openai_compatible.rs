use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{PROBE_PROMPT, execute};
use crate::logging::{LogComponent, LogStage};
use crate::provider::probe::{INVALID_RESPONSE_FORMAT, has_array_field, resolve_url};
use crate::provider::{ProbeOutcome, ProviderAdapter, ProviderType};
use crate::ldebug;
use crate::utils::mask_key;

const ENDPOINT: &str = "/chat/completions";

/// OpenAI 及兼容协议服务商（deepseek、siliconcloud、xai、openrouter）
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleAdapter {
    provider: ProviderType,
    client: Client,
    base_url: String,
}

impl OpenAiCompatibleAdapter {
    #[must_use]
    pub fn new(provider: ProviderType, client: Client, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn probe(
        &self,
        api_key: &str,
        model: &str,
        proxy_base_url: Option<&str>,
    ) -> ProbeOutcome {
        let url = resolve_url(&self.base_url, proxy_base_url, ENDPOINT);
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": PROBE_PROMPT }],
            "max_tokens": 1
        });

        let request = self.client.post(&url).bearer_auth(api_key).json(&body);
        let (status, bytes) = match execute(request).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        ldebug!(
            "probe",
            LogStage::ExternalApi,
            LogComponent::OpenAiAdapter,
            "probe_response",
            &format!("{} probe returned {status}", self.provider),
            key = %mask_key(api_key)
        );

        if let Some(outcome) = ProbeOutcome::from_common_status(status) {
            return outcome;
        }
        if !status.is_success() {
            return ProbeOutcome::http_status(status.as_u16());
        }
        if has_array_field(&bytes, "choices") {
            ProbeOutcome::valid()
        } else {
            ProbeOutcome::protocol_error(INVALID_RESPONSE_FORMAT)
        }
    }
}
