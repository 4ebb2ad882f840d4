//! # 数据库配置

use sea_orm::ConnectOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/key_tester.db".to_string(),
            max_connections: 10,
            connect_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// 检查是否为内存数据库
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 构建 sea-orm 连接参数
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.url.clone());
        options
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .sqlx_logging(false);
        // 内存库每个连接都是独立数据库，必须只保留一个连接
        if self.is_memory_database() {
            options.max_connections(1).min_connections(1);
        }
        options
    }
}
