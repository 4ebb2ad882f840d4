use crate::error::config::ConfigError;
use crate::error::{ConfigResult, TesterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 支持的服务商（固定白名单）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Claude,
    Gemini,
    DeepSeek,
    SiliconCloud,
    Xai,
    OpenRouter,
}

impl ProviderType {
    pub const ALL: [Self; 7] = [
        Self::OpenAI,
        Self::Claude,
        Self::Gemini,
        Self::DeepSeek,
        Self::SiliconCloud,
        Self::Xai,
        Self::OpenRouter,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::SiliconCloud => "siliconcloud",
            Self::Xai => "xai",
            Self::OpenRouter => "openrouter",
        }
    }

    /// 官方默认 base URL（不含结尾斜杠）
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Claude => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::SiliconCloud => "https://api.siliconflow.cn/v1",
            Self::Xai => "https://api.x.ai/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// 逗号分隔的白名单，用于错误提示
    #[must_use]
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 解析服务商标识，只接受白名单中的原样写法
    pub fn parse(name: &str) -> ConfigResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| ConfigError::UnsupportedProvider {
                provider: name.to_string(),
                supported: Self::supported_list(),
            })
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = TesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whitelisted_providers() {
        for provider in ProviderType::ALL {
            assert_eq!(ProviderType::parse(provider.as_str()).unwrap(), provider);
        }
    }

    #[test]
    fn parse_is_exact_match() {
        for name in ["OpenAI", " openai", "openai ", "CLAUDE"] {
            assert!(ProviderType::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_unknown_provider() {
        let err = ProviderType::parse("mistral").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedProvider { .. }));
        assert!(err.to_string().contains("openrouter"));
    }
}
