//! Provider probe module。
//!
//! - `types`：服务商白名单与默认端点
//! - `probe`：探测结果及共享的状态码映射
//! - `traits`：探测适配器 trait
//! - `provider_strategy`：各服务商的具体探测协议
//! - `registry`：集中管理已注册的适配器

pub mod probe;
mod provider_strategy;
mod registry;
mod traits;
mod types;

pub use probe::{ProbeKind, ProbeOutcome};
pub use provider_strategy::{ClaudeAdapter, GeminiAdapter, OpenAiCompatibleAdapter};
pub use registry::AdapterRegistry;
pub use traits::ProviderAdapter;
pub use types::ProviderType;
