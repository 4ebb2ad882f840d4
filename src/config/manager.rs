//! # 配置管理器
//!
//! 负责定位配置文件、解析 TOML 并应用 `KEY_TESTER_` 前缀的环境变量覆盖

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::AppConfig;
use crate::error::config::ConfigError;
use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 环境变量前缀
const ENV_PREFIX: &str = "KEY_TESTER_";
/// 指定配置文件路径的环境变量
const CONFIG_PATH_ENV: &str = "KEY_TESTER_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: AppConfig,
    /// 配置来源文件，使用内置默认值时为空
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按约定位置加载配置
    ///
    /// 优先使用 `KEY_TESTER_CONFIG_PATH`，其次 `config/config.{RUST_ENV}.toml`；
    /// 约定文件不存在时退回内置默认值。
    pub fn new() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config_file = PathBuf::from(format!("config/config.{env_name}.toml"));
        if config_file.exists() {
            return Self::from_file(config_file);
        }

        ldebug!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "use_defaults",
            &format!("配置文件不存在，使用默认配置: {}", config_file.display())
        );
        Self::from_config(AppConfig::default(), None)
    }

    /// 从指定文件创建配置管理器
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config = Self::load_config_file(config_path)?;
        Self::from_config(config, Some(config_path.to_path_buf()))
    }

    fn from_config(mut config: AppConfig, source: Option<PathBuf>) -> Result<Self> {
        let overrides = Self::collect_env_overrides(env::vars());
        Self::apply_env_overrides(&mut config, &overrides)?;
        config.validate().context("配置校验失败")?;

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "配置加载完成",
            source = source
                .as_ref()
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            env_overrides = overrides.len()
        );

        Ok(Self { config, source })
    }

    /// 获取当前配置
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 取出配置所有权
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 配置来源文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(
                ConfigError::Load(format!("配置文件不存在: {}", path.display())).into(),
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(ConfigError::Parse)
            .with_context(|| format!("TOML解析失败: {}", path.display()))?;

        Ok(config)
    }

    /// 收集环境变量覆盖映射
    ///
    /// 例如 `KEY_TESTER_DATABASE_URL` -> `database.url`
    fn collect_env_overrides(
        vars: impl Iterator<Item = (String, String)>,
    ) -> HashMap<String, String> {
        vars.filter(|(key, _)| key != CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|path| (path.to_lowercase().replace('_', "."), value))
            })
            .collect()
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (path, value) in overrides {
            ldebug!(
                "system",
                LogStage::Configuration,
                LogComponent::Config,
                "env_override",
                &format!("应用环境变量覆盖: {path}")
            );
            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将单个覆盖项写入配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["database", "url"] => config.database.url = value.to_string(),
            ["database", "max", "connections"] => {
                config.database.max_connections = parse_value("database.max_connections", value)?;
            }
            ["tester", "default", "concurrency"] | ["default", "concurrency"] => {
                config.tester.default_concurrency =
                    parse_value("tester.default_concurrency", value)?;
            }
            ["tester", "max", "concurrency"] => {
                config.tester.max_concurrency = parse_value("tester.max_concurrency", value)?;
            }
            ["tester", "default", "retry", "count"] => {
                config.tester.default_retry_count =
                    parse_value("tester.default_retry_count", value)?;
            }
            ["tester", "max", "keys", "per", "batch"] => {
                config.tester.max_keys_per_batch =
                    parse_value("tester.max_keys_per_batch", value)?;
            }
            ["tester", "request", "timeout", "secs"] | ["request", "timeout", "secs"] => {
                config.tester.request_timeout_secs =
                    parse_value("tester.request_timeout_secs", value)?;
            }
            ["tester", "batch", "timeout", "secs"] => {
                config.tester.batch_timeout_secs =
                    Some(parse_value("tester.batch_timeout_secs", value)?);
            }
            ["retry", "base", "delay", "ms"] => {
                config.retry.base_delay_ms = parse_value("retry.base_delay_ms", value)?;
            }
            ["retry", "max", "delay", "ms"] => {
                config.retry.max_delay_ms = parse_value("retry.max_delay_ms", value)?;
            }
            _ => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "unknown_override",
                    &format!("未知的配置路径，忽略环境变量覆盖: {path}")
                );
            }
        }

        Ok(())
    }
}

fn parse_value<T>(field: &'static str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        ConfigError::InvalidField {
            field,
            message: format!("'{value}': {e}"),
        }
        .into()
    })
}
