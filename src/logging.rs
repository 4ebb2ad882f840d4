//! # 日志配置模块
//!
//! 提供日志系统初始化以及带阶段/组件标签的结构化日志宏。
//!
//! 所有宏的参数顺序一致：
//! `(request_id, LogStage, LogComponent, operation, description, 字段...)`

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 进程启动
    Startup,
    /// 进程关闭
    Shutdown,
    /// 配置加载
    Configuration,
    /// 批次参数校验
    Validation,
    /// 任务调度
    Scheduling,
    /// 外部 API 调用
    ExternalApi,
    /// 重试决策
    Retry,
    /// 结果归类
    Classification,
    /// 数据库读写
    Db,
    /// 内部错误
    Internal,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Scheduling => "scheduling",
            Self::ExternalApi => "external_api",
            Self::Retry => "retry",
            Self::Classification => "classification",
            Self::Db => "db",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置管理
    Config,
    /// 数据库
    Database,
    /// 批次协调器
    BatchRunner,
    /// 并发编排器
    Orchestrator,
    /// 适配器注册表
    Registry,
    /// OpenAI 兼容适配器
    OpenAiAdapter,
    /// Claude 适配器
    ClaudeAdapter,
    /// Gemini 适配器
    GeminiAdapter,
    /// 结果存储
    Storage,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::BatchRunner => "batch_runner",
            Self::Orchestrator => "orchestrator",
            Self::Registry => "registry",
            Self::OpenAiAdapter => "openai_adapter",
            Self::ClaudeAdapter => "claude_adapter",
            Self::GeminiAdapter => "gemini_adapter",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __structured_log {
    ($level:ident, $request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($field:tt)+)?) => {
        ::tracing::$level!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($field)+,)?
            "{}",
            $description
        )
    };
}

/// 结构化 INFO 日志
#[macro_export]
macro_rules! linfo {
    ($($arg:tt)+) => { $crate::__structured_log!(info, $($arg)+) };
}

/// 结构化 DEBUG 日志
#[macro_export]
macro_rules! ldebug {
    ($($arg:tt)+) => { $crate::__structured_log!(debug, $($arg)+) };
}

/// 结构化 WARN 日志
#[macro_export]
macro_rules! lwarn {
    ($($arg:tt)+) => { $crate::__structured_log!(warn, $($arg)+) };
}

/// 结构化 ERROR 日志
#[macro_export]
macro_rules! lerror {
    ($($arg:tt)+) => { $crate::__structured_log!(error, $($arg)+) };
}

/// 默认过滤规则：按请求的级别输出，数据库驱动只保留告警
fn default_filter(level: &str) -> String {
    format!("{level},sqlx=warn,sea_orm=warn")
}

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先生效；重复初始化会被忽略（测试中常见）。
/// 日志写到 stderr，stdout 只留给报告输出。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if env::var("RUST_LOG").is_ok() {
        tracing::debug!("RUST_LOG override active");
    }
}
