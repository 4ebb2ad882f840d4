//! # 密钥校验引擎
//!
//! 批次协调器 → 并发编排器 → 适配器注册表 → 服务商适配器 → 结果归类 → 存储

pub mod classifier;
pub mod orchestrator;
pub mod retry;
pub mod runner;
pub mod types;

pub use classifier::{ResultCounters, ResultCounts, ResultStatus, classify};
pub use orchestrator::{KeyCompletion, Orchestrator, ProbePlan};
pub use retry::RetryPolicy;
pub use runner::{BatchRunner, TesterContext};
pub use types::{
    BatchItem, BatchReport, ClassifiedResult, ResultQuery, ResultsPage, SessionAggregate,
    SessionStatus, ValidationRequest, new_test_id,
};
