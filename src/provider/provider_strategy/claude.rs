use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use super::{PROBE_PROMPT, execute};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::provider::probe::resolve_url;
use crate::provider::{ProbeOutcome, ProviderAdapter, ProviderType};
use crate::utils::mask_key;

const ENDPOINT: &str = "/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude 适配器
///
/// 400 且 `error.type == "invalid_request_error"` 说明密钥已通过鉴权，只是请求体被拒绝，视为有效。
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    client: Client,
    base_url: String,
}

impl ClaudeAdapter {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn is_invalid_request_error(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/type")
                .and_then(Value::as_str)
                .map(|t| t == "invalid_request_error")
        })
        .unwrap_or(false)
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Claude
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
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": PROBE_PROMPT }]
        });

        let request = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let (status, bytes) = match execute(request).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        ldebug!(
            "probe",
            LogStage::ExternalApi,
            LogComponent::ClaudeAdapter,
            "probe_response",
            &format!("claude probe returned {status}"),
            key = %mask_key(api_key)
        );

        if let Some(outcome) = ProbeOutcome::from_common_status(status) {
            return outcome;
        }
        if status == StatusCode::BAD_REQUEST && is_invalid_request_error(&bytes) {
            return ProbeOutcome::valid();
        }
        if status.is_success() {
            return ProbeOutcome::valid();
        }
        ProbeOutcome::http_status(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_invalid_request_error() {
        assert!(is_invalid_request_error(
            br#"{"type":"error","error":{"type":"invalid_request_error","message":"bad model"}}"#
        ));
        assert!(!is_invalid_request_error(
            br#"{"error":{"type":"authentication_error"}}"#
        ));
        assert!(!is_invalid_request_error(b"Bad Request"));
    }
}
