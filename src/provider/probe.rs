//! # 探测结果与共享的响应映射
//!
//! 适配器从不向调用方返回错误：网络、解析、协议错误都折叠为 `valid: false` 的结果。

use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error as StdError;

pub const AUTH_FAILED: &str = "Auth failed (401)";
pub const PERMISSION_DENIED: &str = "Permission denied (403)";
pub const RATE_LIMITED: &str = "Rate limited (429)";
pub const INVALID_RESPONSE_FORMAT: &str = "Invalid response format";
pub const CANCELLED: &str = "Cancelled before completion";

/// 单次探测的失败类别，驱动重试决策（不持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Valid,
    AuthFailure,
    PermissionDenied,
    RateLimited,
    /// 2xx 但响应结构不符，或服务商特定的拒绝
    ProtocolError,
    HttpStatus(u16),
    Transport,
    Cancelled,
}

/// 单个密钥的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub valid: bool,
    pub is_rate_limit: bool,
    /// 预留扩展位，目前始终未知
    pub is_paid: Option<bool>,
    pub error: Option<String>,
    pub kind: ProbeKind,
}

impl ProbeOutcome {
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            valid: true,
            is_rate_limit: false,
            is_paid: None,
            error: None,
            kind: ProbeKind::Valid,
        }
    }

    fn invalid(kind: ProbeKind, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            is_rate_limit: false,
            is_paid: None,
            error: Some(error.into()),
            kind,
        }
    }

    #[must_use]
    pub fn auth_failure() -> Self {
        Self::invalid(ProbeKind::AuthFailure, AUTH_FAILED)
    }

    #[must_use]
    pub fn permission_denied() -> Self {
        Self::invalid(ProbeKind::PermissionDenied, PERMISSION_DENIED)
    }

    #[must_use]
    pub fn rate_limited() -> Self {
        Self {
            is_rate_limit: true,
            ..Self::invalid(ProbeKind::RateLimited, RATE_LIMITED)
        }
    }

    #[must_use]
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::invalid(ProbeKind::ProtocolError, message)
    }

    #[must_use]
    pub fn http_status(status: u16) -> Self {
        Self::invalid(ProbeKind::HttpStatus(status), format!("HTTP {status}"))
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::invalid(ProbeKind::Transport, message)
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::invalid(ProbeKind::Cancelled, CANCELLED)
    }

    /// 是否值得重试：传输错误、5xx、408；429 永不重试
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self.kind {
            ProbeKind::Transport => true,
            ProbeKind::HttpStatus(status) => status == 408 || status >= 500,
            _ => false,
        }
    }

    /// 401/403/429 的共享映射，其余状态返回 `None` 交由适配器处理
    #[must_use]
    pub fn from_common_status(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            401 => Some(Self::auth_failure()),
            403 => Some(Self::permission_denied()),
            429 => Some(Self::rate_limited()),
            _ => None,
        }
    }

    /// 从 reqwest 错误构建传输失败结果
    ///
    /// 去掉 URL 后再拼接错误链，Gemini 的密钥位于查询串中。
    #[must_use]
    pub fn from_transport_error(err: reqwest::Error) -> Self {
        Self::transport(transport_message(err))
    }
}

/// 拼接代理或默认 base URL 与端点后缀
///
/// 代理地址原样替换默认地址，只去掉一个结尾斜杠。
#[must_use]
pub fn resolve_url(default_base: &str, proxy_base_url: Option<&str>, suffix: &str) -> String {
    let base = proxy_base_url.unwrap_or(default_base);
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{base}{suffix}")
}

/// 响应体是否为包含指定数组字段的 JSON 对象
#[must_use]
pub fn has_array_field(body: &[u8], field: &str) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get(field).map(Value::is_array))
        .unwrap_or(false)
}

fn transport_message(err: reqwest::Error) -> String {
    let err = err.without_url();
    let prefix = if err.is_timeout() {
        "Request timed out"
    } else if err.is_connect() {
        "Connection failed"
    } else {
        "Request failed"
    };

    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    format!("{prefix}: {}", parts.join(": "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ProbeOutcome::transport("connection reset"), true)]
    #[case(ProbeOutcome::http_status(500), true)]
    #[case(ProbeOutcome::http_status(503), true)]
    #[case(ProbeOutcome::http_status(408), true)]
    #[case(ProbeOutcome::http_status(404), false)]
    #[case(ProbeOutcome::rate_limited(), false)]
    #[case(ProbeOutcome::auth_failure(), false)]
    #[case(ProbeOutcome::protocol_error(INVALID_RESPONSE_FORMAT), false)]
    #[case(ProbeOutcome::cancelled(), false)]
    #[case(ProbeOutcome::valid(), false)]
    fn transient_outcomes(#[case] outcome: ProbeOutcome, #[case] expected: bool) {
        assert_eq!(outcome.is_transient(), expected);
    }

    #[test]
    fn rate_limited_sets_flag() {
        let outcome = ProbeOutcome::rate_limited();
        assert!(!outcome.valid);
        assert!(outcome.is_rate_limit);
        assert_eq!(outcome.error.as_deref(), Some(RATE_LIMITED));
        assert_eq!(outcome.is_paid, None);
    }

    #[test]
    fn common_status_mapping() {
        assert_eq!(
            ProbeOutcome::from_common_status(StatusCode::UNAUTHORIZED),
            Some(ProbeOutcome::auth_failure())
        );
        assert_eq!(
            ProbeOutcome::from_common_status(StatusCode::FORBIDDEN),
            Some(ProbeOutcome::permission_denied())
        );
        assert_eq!(
            ProbeOutcome::from_common_status(StatusCode::TOO_MANY_REQUESTS),
            Some(ProbeOutcome::rate_limited())
        );
        assert_eq!(ProbeOutcome::from_common_status(StatusCode::BAD_REQUEST), None);
        assert_eq!(
            ProbeOutcome::http_status(418).error.as_deref(),
            Some("HTTP 418")
        );
    }

    #[rstest]
    #[case(None, "https://api.openai.com/v1/chat/completions")]
    #[case(Some("https://proxy.local"), "https://proxy.local/chat/completions")]
    #[case(Some("https://proxy.local/v1/"), "https://proxy.local/v1/chat/completions")]
    #[case(Some("https://proxy.local//"), "https://proxy.local//chat/completions")]
    fn url_resolution(#[case] proxy: Option<&str>, #[case] expected: &str) {
        assert_eq!(
            resolve_url("https://api.openai.com/v1", proxy, "/chat/completions"),
            expected
        );
    }

    #[test]
    fn array_field_detection() {
        assert!(has_array_field(br#"{"choices":[]}"#, "choices"));
        assert!(!has_array_field(br#"{"choices":{}}"#, "choices"));
        assert!(!has_array_field(br#"{"id":"x"}"#, "choices"));
        assert!(!has_array_field(b"<html>ok</html>", "choices"));
    }
}
