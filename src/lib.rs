//! # API Key Tester Library
//!
//! LLM 服务商 API 密钥批量校验引擎核心库

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod provider;
pub mod report;
pub mod storage;
pub mod tester;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, TesterError};
pub use provider::{AdapterRegistry, ProviderType};
pub use storage::{DatabaseStorage, MemoryStorage, Storage};
pub use tester::{BatchReport, BatchRunner, TesterContext, ValidationRequest};
