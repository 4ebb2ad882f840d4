//! # 错误类型定义

use thiserror::Error;

use super::config::ConfigError;
use super::database::DatabaseError;
use super::network::NetworkError;
use super::provider::ProviderError;
use super::storage::StorageError;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum TesterError {
    /// 配置与批次参数错误（批次级致命）
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 数据库相关错误
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// 网络通信错误
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// AI服务商错误
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 存储协作者错误
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 资源未找到
    #[error("{resource} not found: {identifier}")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },

    /// 系统内部错误
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TesterError>,
    },
}

impl TesterError {
    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<I: Into<String>>(resource: &'static str, identifier: I) -> Self {
        Self::NotFound {
            resource,
            identifier: identifier.into(),
        }
    }

    /// 是否为配置类错误（批次在任何网络活动前被拒绝）
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Context { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// 错误分类，用于日志与退出码
    #[must_use]
    pub const fn category(&self) -> super::ErrorCategory {
        match self {
            Self::Config(_) | Self::NotFound { .. } => super::ErrorCategory::Client,
            _ => super::ErrorCategory::Server,
        }
    }
}

impl From<sea_orm::DbErr> for TesterError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(DatabaseError::Query(err))
    }
}

impl From<reqwest::Error> for TesterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(NetworkError::Reqwest(err))
    }
}

impl From<toml::de::Error> for TesterError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(ConfigError::Parse(err))
    }
}
