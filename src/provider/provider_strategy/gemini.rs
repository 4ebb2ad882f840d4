use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use super::{PROBE_PROMPT, execute};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::provider::probe::{INVALID_RESPONSE_FORMAT, has_array_field, resolve_url};
use crate::provider::{ProbeOutcome, ProviderAdapter, ProviderType};
use crate::utils::mask_key;

const INVALID_API_KEY: &str = "Invalid API key (400)";

/// Google Gemini 适配器，密钥通过 `key` 查询参数传递
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
}

impl GeminiAdapter {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Gemini
    }

    async fn probe(
        &self,
        api_key: &str,
        model: &str,
        proxy_base_url: Option<&str>,
    ) -> ProbeOutcome {
        let url = resolve_url(
            &self.base_url,
            proxy_base_url,
            &format!("/models/{model}:generateContent"),
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": PROBE_PROMPT }] }]
        });

        let request = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body);
        let (status, bytes) = match execute(request).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        ldebug!(
            "probe",
            LogStage::ExternalApi,
            LogComponent::GeminiAdapter,
            "probe_response",
            &format!("gemini probe returned {status}"),
            key = %mask_key(api_key)
        );

        // 400 优先于通用映射
        if status == StatusCode::BAD_REQUEST {
            return ProbeOutcome::protocol_error(INVALID_API_KEY);
        }
        if let Some(outcome) = ProbeOutcome::from_common_status(status) {
            return outcome;
        }
        if !status.is_success() {
            return ProbeOutcome::http_status(status.as_u16());
        }
        if has_array_field(&bytes, "candidates") {
            ProbeOutcome::valid()
        } else {
            ProbeOutcome::protocol_error(INVALID_RESPONSE_FORMAT)
        }
    }
}
